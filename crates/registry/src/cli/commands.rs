//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands and how their
//! arguments map onto library types.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{ArgGroup, Args, Subcommand, ValueEnum};

use crate::export::{ExportFormat, ExportTables};
use crate::identity::CaregiverKey;
use crate::import::RowKind;
use crate::query::{CaregiverAgeGroup, CaregiverFilter, ChildAgeGroup, ChildFilter, NamePattern};
use crate::records::{CaregiverInput, CaregiverPatch, ChildInput, EducationLevel, Gender};
use crate::verification::{NameFilter, VerificationStatus};

/// Parse a value with its `FromStr` impl, reporting the library error text.
fn parse<T>(raw: &str) -> Result<T, String>
where
    T: std::str::FromStr<Err = crate::error::Error>,
{
    raw.parse().map_err(|e: crate::error::Error| e.to_string())
}

fn parse_key(raw: &str) -> Result<CaregiverKey, String> {
    parse(raw)
}

fn parse_gender(raw: &str) -> Result<Gender, String> {
    parse(raw)
}

fn parse_education(raw: &str) -> Result<EducationLevel, String> {
    parse(raw)
}

fn parse_caregiver_age_group(raw: &str) -> Result<CaregiverAgeGroup, String> {
    parse(raw)
}

fn parse_child_age_group(raw: &str) -> Result<ChildAgeGroup, String> {
    parse(raw)
}

fn parse_status(raw: &str) -> Result<VerificationStatus, String> {
    parse(raw)
}

/// Caregiver commands.
#[derive(Debug, Subcommand)]
pub enum CaregiverCommand {
    /// Save a caregiver together with the full list of their children
    ///
    /// Children already on file but missing from the submission are deleted.
    Save(SaveCommand),

    /// Change some fields of a caregiver, keeping their children
    Edit(EditCommand),

    /// Delete a caregiver and all of their children
    Delete {
        /// Caregiver key
        #[arg(value_parser = parse_key)]
        key: CaregiverKey,
    },

    /// Show a caregiver and their children
    Show {
        /// Caregiver key
        #[arg(value_parser = parse_key)]
        key: CaregiverKey,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List caregivers
    List {
        #[command(flatten)]
        filter: CaregiverFilterArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Caregiver fields given as flags.
#[derive(Debug, Default, Args)]
pub struct CaregiverFields {
    /// Full name
    #[arg(long)]
    pub name: Option<String>,

    /// Phone number
    #[arg(long)]
    pub phone: Option<String>,

    /// Gender (male, female)
    #[arg(long, value_parser = parse_gender)]
    pub gender: Option<Gender>,

    /// Profession
    #[arg(long)]
    pub profession: Option<String>,

    /// Date of birth (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub dob: Option<NaiveDate>,

    /// Age in years
    #[arg(long)]
    pub age: Option<u32>,

    /// Address
    #[arg(long)]
    pub address: Option<String>,

    /// Zonal leader
    #[arg(long)]
    pub zonal_leader: Option<String>,

    /// Bank name
    #[arg(long)]
    pub bank: Option<String>,

    /// Bank account number
    #[arg(long)]
    pub account_number: Option<String>,

    /// Declared number of children
    #[arg(long)]
    pub kids: Option<u32>,
}

impl CaregiverFields {
    /// Fields as a full caregiver input; missing fields are blank.
    #[must_use]
    pub fn to_input(&self) -> CaregiverInput {
        CaregiverInput {
            name: self.name.clone().unwrap_or_default(),
            gender: self.gender.unwrap_or_default(),
            profession: self.profession.clone().unwrap_or_default(),
            date_of_birth: self.dob,
            age: self.age,
            phone: self.phone.clone().unwrap_or_default(),
            address: self.address.clone().unwrap_or_default(),
            zonal_leader: self.zonal_leader.clone().unwrap_or_default(),
            bank: self.bank.clone().unwrap_or_default(),
            account_number: self.account_number.clone().unwrap_or_default(),
            number_of_kids: self.kids,
        }
    }

    /// Fields as a patch; missing fields are left unchanged.
    #[must_use]
    pub fn to_patch(&self) -> CaregiverPatch {
        CaregiverPatch {
            name: self.name.clone(),
            gender: self.gender,
            profession: self.profession.clone(),
            date_of_birth: self.dob,
            age: self.age,
            phone: self.phone.clone(),
            address: self.address.clone(),
            zonal_leader: self.zonal_leader.clone(),
            bank: self.bank.clone(),
            account_number: self.account_number.clone(),
            number_of_kids: self.kids,
        }
    }
}

/// `caregiver save` arguments.
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("source").required(true).args(["file", "name"])))]
pub struct SaveCommand {
    /// Read the submission from a JSON file
    /// (`{"current_key": ..., "caregiver": {...}, "children": [...]}`)
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Key the caregiver is stored under now, when editing an existing family
    #[arg(long, value_parser = parse_key)]
    pub key: Option<CaregiverKey>,

    #[command(flatten)]
    pub fields: CaregiverFields,

    /// Child name; repeat for each child
    #[arg(long = "child", value_name = "NAME")]
    pub children: Vec<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

impl SaveCommand {
    /// Children given as `--child` flags.
    #[must_use]
    pub fn child_inputs(&self) -> Vec<ChildInput> {
        self.children.iter().map(ChildInput::named).collect()
    }
}

/// `caregiver edit` arguments.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Caregiver key
    #[arg(value_parser = parse_key)]
    pub key: CaregiverKey,

    #[command(flatten)]
    pub fields: CaregiverFields,
}

/// Caregiver list filters.
#[derive(Debug, Default, Args)]
pub struct CaregiverFilterArgs {
    /// Name search (regex, case-insensitive)
    #[arg(long = "search", value_name = "PATTERN")]
    pub name: Option<String>,

    /// Gender; repeat to allow several
    #[arg(long = "gender", value_parser = parse_gender)]
    pub genders: Vec<Gender>,

    /// Age group (e.g. "30-39", "60+"); repeat to allow several
    #[arg(long = "age-group", value_parser = parse_caregiver_age_group)]
    pub age_groups: Vec<CaregiverAgeGroup>,

    /// Profession; repeat to allow several
    #[arg(long = "profession")]
    pub professions: Vec<String>,

    /// Zonal leader; repeat to allow several
    #[arg(long = "zonal-leader")]
    pub zonal_leaders: Vec<String>,
}

impl CaregiverFilterArgs {
    /// Build the library filter.
    #[must_use]
    pub fn to_filter(&self) -> CaregiverFilter {
        CaregiverFilter {
            name: self.name.as_deref().and_then(NamePattern::new),
            genders: self.genders.clone(),
            age_groups: self.age_groups.clone(),
            professions: self.professions.clone(),
            zonal_leaders: self.zonal_leaders.clone(),
        }
    }
}

/// Child list filters.
#[derive(Debug, Default, Args)]
pub struct ChildFilterArgs {
    /// Search over child and caregiver names (regex, case-insensitive)
    #[arg(id = "child_search", long = "child-search", value_name = "PATTERN")]
    pub name: Option<String>,

    /// Child gender; repeat to allow several
    #[arg(id = "child_genders", long = "child-gender", value_parser = parse_gender)]
    pub genders: Vec<Gender>,

    /// Child age group (e.g. "6-12"); repeat to allow several
    #[arg(id = "child_age_groups", long = "child-age-group", value_parser = parse_child_age_group)]
    pub age_groups: Vec<ChildAgeGroup>,

    /// Education level; repeat to allow several
    #[arg(long = "education", value_parser = parse_education)]
    pub education_levels: Vec<EducationLevel>,

    /// Child profession; repeat to allow several
    #[arg(id = "child_professions", long = "child-profession")]
    pub professions: Vec<String>,
}

impl ChildFilterArgs {
    /// Build the library filter.
    #[must_use]
    pub fn to_filter(&self) -> ChildFilter {
        ChildFilter {
            name: self.name.as_deref().and_then(NamePattern::new),
            genders: self.genders.clone(),
            age_groups: self.age_groups.clone(),
            education_levels: self.education_levels.clone(),
            professions: self.professions.clone(),
        }
    }
}

/// Child commands.
#[derive(Debug, Subcommand)]
pub enum ChildCommand {
    /// List children
    List {
        #[command(flatten)]
        filter: ChildFilterArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Import command arguments.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// CSV, Excel/ODS or JSON file to read
    pub file: PathBuf,

    /// What each row describes
    #[arg(short, long, value_enum)]
    pub kind: RowKindArg,

    /// Worksheet to read (spreadsheets only)
    #[arg(long)]
    pub sheet: Option<String>,

    /// Output the import report as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Directory to write into
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// File format
    #[arg(short, long, value_enum, default_value = "csv")]
    pub format: ExportFormatArg,

    /// Tables to export
    #[arg(short, long, value_enum, default_value = "all")]
    pub tables: ExportTablesArg,

    #[command(flatten)]
    pub caregivers: CaregiverFilterArgs,

    #[command(flatten)]
    pub children: ChildFilterArgs,
}

/// Data migrations.
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Fill blank child phone numbers from their caregiver
    ChildPhones,
}

/// Unverified name filters.
#[derive(Debug, Default, Args)]
pub struct NameFilterArgs {
    /// Only names with this status (pending, verified, rejected)
    #[arg(long, value_parser = parse_status)]
    pub status: Option<VerificationStatus>,

    /// Only names containing this text
    #[arg(long)]
    pub search: Option<String>,
}

impl NameFilterArgs {
    /// Build the library filter.
    #[must_use]
    pub fn to_filter(&self) -> NameFilter {
        NameFilter {
            ids: Vec::new(),
            status: self.status,
            search: self.search.clone(),
        }
    }
}

/// Unverified names commands.
#[derive(Debug, Subcommand)]
pub enum NamesCommand {
    /// Upload names from one column of a CSV, Excel/ODS or JSON file
    Upload {
        /// File to read
        file: PathBuf,

        /// Column holding the names (defaults to the configured column)
        #[arg(long)]
        column: Option<String>,

        /// Worksheet to read (spreadsheets only)
        #[arg(long)]
        sheet: Option<String>,
    },

    /// Add names given on the command line
    Add {
        /// Names to add
        #[arg(required = true)]
        names: Vec<String>,

        /// Notes to attach
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// List names
    List {
        #[command(flatten)]
        filter: NameFilterArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Verify a pending name
    Verify {
        /// Name id
        id: String,
    },

    /// Reject a pending name
    Reject {
        /// Name id
        id: String,
    },

    /// Verify every pending name matching the filter
    VerifyAll {
        /// Only names containing this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Reject every pending name matching the filter
    RejectAll {
        /// Only names containing this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Delete names by id or by filter
    Delete {
        /// Name ids
        ids: Vec<String>,

        #[command(flatten)]
        filter: NameFilterArgs,

        /// Allow deleting every name when no id or filter is given
        #[arg(long)]
        all: bool,
    },

    /// Replace the notes on a name
    Note {
        /// Name id
        id: String,

        /// New notes
        notes: String,
    },

    /// Show counts by status
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Register a verified name as a caregiver
    Promote {
        /// Name id
        id: String,

        /// Phone number for the new caregiver
        #[arg(long, default_value = "")]
        phone: String,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Row kind argument for imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RowKindArg {
    /// One caregiver per row
    Caregiver,
    /// One child per row
    Child,
}

impl From<RowKindArg> for RowKind {
    fn from(arg: RowKindArg) -> Self {
        match arg {
            RowKindArg::Caregiver => Self::Caregiver,
            RowKindArg::Child => Self::Child,
        }
    }
}

/// Export file format argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormatArg {
    /// One CSV file per table
    Csv,
    /// One Excel workbook with a sheet per table
    Xlsx,
    /// One JSON file
    Json,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Csv => Self::Csv,
            ExportFormatArg::Xlsx => Self::Xlsx,
            ExportFormatArg::Json => Self::Json,
        }
    }
}

/// Export table selection argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportTablesArg {
    /// Caregivers and children
    All,
    /// Caregivers only
    Caregivers,
    /// Children only
    Children,
}

impl From<ExportTablesArg> for ExportTables {
    fn from(arg: ExportTablesArg) -> Self {
        match arg {
            ExportTablesArg::All => Self::All,
            ExportTablesArg::Caregivers => Self::Caregivers,
            ExportTablesArg::Children => Self::Children,
        }
    }
}

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text table
    #[default]
    Table,
    /// CSV with a header row
    Csv,
    /// JSON array
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_kind_arg_conversion() {
        assert_eq!(RowKind::from(RowKindArg::Caregiver), RowKind::Caregiver);
        assert_eq!(RowKind::from(RowKindArg::Child), RowKind::Child);
    }

    #[test]
    fn test_export_arg_conversion() {
        assert_eq!(ExportFormat::from(ExportFormatArg::Json), ExportFormat::Json);
        assert_eq!(ExportFormat::from(ExportFormatArg::Xlsx), ExportFormat::Xlsx);
        assert_eq!(ExportTables::from(ExportTablesArg::Children), ExportTables::Children);
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
    }

    #[test]
    fn test_fields_to_input_and_patch() {
        let fields = CaregiverFields {
            name: Some("Jane Doe".to_string()),
            phone: Some("0803".to_string()),
            kids: Some(2),
            ..CaregiverFields::default()
        };
        let input = fields.to_input();
        assert_eq!(input.name, "Jane Doe");
        assert_eq!(input.address, "");
        assert_eq!(input.number_of_kids, Some(2));

        let patch = fields.to_patch();
        assert_eq!(patch.phone.as_deref(), Some("0803"));
        assert!(patch.address.is_none());
        assert!(CaregiverFields::default().to_patch().is_empty());
    }

    #[test]
    fn test_filter_args() {
        let args = CaregiverFilterArgs {
            name: Some("  ".to_string()),
            genders: vec![Gender::Female],
            ..CaregiverFilterArgs::default()
        };
        let filter = args.to_filter();
        assert!(filter.name.is_none());
        assert_eq!(filter.genders, vec![Gender::Female]);

        let names = NameFilterArgs {
            status: Some(VerificationStatus::Pending),
            search: None,
        };
        assert_eq!(names.to_filter(), NameFilter::status(VerificationStatus::Pending));
    }

    #[test]
    fn test_value_parsers() {
        assert!(parse_key("a00da052508c").is_ok());
        assert!(parse_key("A00DA052508C").is_err());
        assert_eq!(parse_gender(" Female "), Ok(Gender::Female));
        assert_eq!(parse_status("verified"), Ok(VerificationStatus::Verified));
        assert!(parse_status("done").is_err());
    }
}
