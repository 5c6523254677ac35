//! `carereg` - CLI for the caregiver registry
//!
//! This binary provides the command-line interface for recording caregivers
//! and their children, importing and exporting files, and working through the
//! unverified names list.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use caregiver_registry::cli::{
    CaregiverCommand, ChildCommand, Cli, Command, ConfigCommand, ExportCommand, ImportCommand,
    MigrateCommand, NamesCommand, OutputFormat, SaveCommand,
};
use caregiver_registry::export::write_csv;
use caregiver_registry::records::{Caregiver, Child};
use caregiver_registry::reconcile::Submission;
use caregiver_registry::summary::{Count, Summary};
use caregiver_registry::verification::{Decision, NameFilter, UnverifiedName};
use caregiver_registry::{init_logging, App, Config};

type CliResult = Result<(), Box<dyn Error>>;

fn main() -> CliResult {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    // config commands must work even when the config file is broken
    if let Command::Config(config_cmd) = cli.command {
        return handle_config(cli.config, config_cmd);
    }

    let config = Config::load_from(cli.config.clone())?;
    let mut app = App::open(config)?;

    match cli.command {
        Command::Caregiver(cmd) => handle_caregiver(&mut app, cmd),
        Command::Child(ChildCommand::List { filter, format }) => {
            let children = app.children(&filter.to_filter())?;
            print_children(&children, format)
        }
        Command::Import(cmd) => handle_import(&mut app, &cmd),
        Command::Export(cmd) => handle_export(&app, &cmd),
        Command::Migrate(MigrateCommand::ChildPhones) => {
            let report = app.backfill_child_phones()?;
            if let Some(backup) = &report.backup {
                println!("Backup written to {}", backup.display());
            }
            println!("Filled in {} child phone number(s).", report.updated);
            Ok(())
        }
        Command::Backup => {
            let path = app.backup()?;
            println!("Backup written to {}", path.display());
            Ok(())
        }
        Command::Stats { json } => handle_stats(&app, json),
        Command::Status { json } => handle_status(&app, json),
        Command::Names(cmd) => handle_names(&mut app, cmd),
        Command::Config(_) => Ok(()),
    }
}

fn handle_caregiver(app: &mut App, cmd: CaregiverCommand) -> CliResult {
    match cmd {
        CaregiverCommand::Save(save) => handle_save(app, &save),
        CaregiverCommand::Edit(edit) => {
            let patch = edit.fields.to_patch();
            if patch.is_empty() {
                println!("Nothing to change.");
                return Ok(());
            }
            let report = app.edit_caregiver(&edit.key, patch)?;
            match &report.previous_key {
                Some(old) => println!(
                    "Updated caregiver; key changed {old} -> {} ({} child(ren) moved).",
                    report.key, report.children_moved
                ),
                None => println!("Updated caregiver {}.", report.key),
            }
            Ok(())
        }
        CaregiverCommand::Delete { key } => {
            let report = app.delete_caregiver(&key)?;
            println!(
                "Deleted caregiver {key} and {} child(ren).",
                report.children_removed
            );
            Ok(())
        }
        CaregiverCommand::Show { key, json } => {
            let (caregiver, children) = app.caregiver(&key)?;
            if json {
                let value = serde_json::json!({
                    "caregiver": caregiver,
                    "children": children,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print_caregiver_detail(&caregiver);
                println!();
                print_children(&children, OutputFormat::Table)?;
            }
            Ok(())
        }
        CaregiverCommand::List { filter, format } => {
            let caregivers = app.caregivers(&filter.to_filter())?;
            print_caregivers(&caregivers, format)
        }
    }
}

fn handle_save(app: &mut App, save: &SaveCommand) -> CliResult {
    let mut submission = match &save.file {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str::<Submission>(&text)?
        }
        None => Submission::new(save.fields.to_input(), save.child_inputs()),
    };
    if let Some(key) = &save.key {
        submission = submission.editing(key.clone());
    }

    let report = app.save_submission(submission)?;
    if save.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Saved caregiver {}.", report.key);
    if let Some(old) = &report.previous_key {
        println!("  Key changed from {old}.");
    }
    println!("  Children saved:   {}", report.children_saved);
    println!("  Children removed: {}", report.children_removed);
    if report.phones_filled > 0 {
        println!("  Phones copied from caregiver: {}", report.phones_filled);
    }
    Ok(())
}

fn handle_import(app: &mut App, cmd: &ImportCommand) -> CliResult {
    let report = app.import_file(&cmd.file, cmd.kind.into(), cmd.sheet.as_deref())?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Imported {} of {} row(s) from {}.",
        report.imported, report.rows_read, report.source
    );
    for skipped in &report.skipped {
        println!("  Row {}: {}", skipped.row, skipped.reason);
    }
    Ok(())
}

fn handle_export(app: &App, cmd: &ExportCommand) -> CliResult {
    let files = app.export(
        &cmd.dir,
        cmd.format.into(),
        cmd.tables.into(),
        &cmd.caregivers.to_filter(),
        &cmd.children.to_filter(),
    )?;
    for file in files {
        println!("Wrote {}", file.display());
    }
    Ok(())
}

fn handle_names(app: &mut App, cmd: NamesCommand) -> CliResult {
    match cmd {
        NamesCommand::Upload {
            file,
            column,
            sheet,
        } => {
            let upload = app.upload_names(&file, column.as_deref(), sheet.as_deref())?;
            println!(
                "Added {} new name(s); {} already listed.",
                upload.added,
                upload.read - upload.added
            );
        }
        NamesCommand::Add { names, notes } => {
            let added = app.add_names(&names, &notes)?;
            println!("Added {added} new name(s).");
        }
        NamesCommand::List { filter, format } => {
            let names = app.names(&filter.to_filter())?;
            print_names(&names, format)?;
        }
        NamesCommand::Verify { id } => {
            let record = app.decide_name(&id, Decision::Verify)?;
            println!("Verified '{}'.", record.name);
        }
        NamesCommand::Reject { id } => {
            let record = app.decide_name(&id, Decision::Reject)?;
            println!("Rejected '{}'.", record.name);
        }
        NamesCommand::VerifyAll { search } => bulk_decide(app, search, Decision::Verify)?,
        NamesCommand::RejectAll { search } => bulk_decide(app, search, Decision::Reject)?,
        NamesCommand::Delete { ids, filter, all } => {
            let mut filter = filter.to_filter();
            filter.ids = ids;
            if filter.is_unrestricted() && !all {
                println!("This would delete every name. Use --all to confirm.");
                return Ok(());
            }
            let removed = app.delete_names(&filter)?;
            println!("Deleted {removed} name(s).");
        }
        NamesCommand::Note { id, notes } => {
            app.set_name_notes(&id, &notes)?;
            println!("Notes updated.");
        }
        NamesCommand::Stats { json } => {
            let stats = app.name_stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Total:    {}", stats.total);
                println!("Pending:  {}", stats.pending);
                println!("Verified: {}", stats.verified);
                println!("Rejected: {}", stats.rejected);
            }
        }
        NamesCommand::Promote { id, phone } => {
            let report = app.promote_name(&id, &phone)?;
            println!("Registered caregiver {}.", report.key);
        }
    }
    Ok(())
}

fn bulk_decide(app: &mut App, search: Option<String>, decision: Decision) -> CliResult {
    let filter = NameFilter {
        search,
        ..NameFilter::default()
    };
    let outcome = app.decide_matching(&filter, decision)?;
    println!(
        "Updated {} name(s); skipped {} already decided.",
        outcome.updated, outcome.skipped
    );
    Ok(())
}

fn handle_stats(app: &App, json: bool) -> CliResult {
    let summary = app.summary()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn handle_status(app: &App, json: bool) -> CliResult {
    let stats = app.status()?;
    let database = app.config().database_path();
    if json {
        let status = serde_json::json!({
            "database_path": database,
            "schema_version": stats.schema_version,
            "caregivers": stats.caregivers,
            "children": stats.children,
            "unverified_names": stats.unverified_names,
            "last_saved": stats.last_saved,
            "db_size_bytes": stats.db_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("carereg status");
        println!("--------------");
        println!("Database:         {}", database.display());
        println!("Schema version:   {}", stats.schema_version);
        println!("Caregivers:       {}", stats.caregivers);
        println!("Children:         {}", stats.children);
        println!("Unverified names: {}", stats.unverified_names);
        match stats.last_saved {
            Some(at) => println!("Last saved:       {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => println!("Last saved:       never"),
        }
        println!("Size:             {} bytes", stats.db_size_bytes);
    }
    Ok(())
}

fn handle_config(path: Option<PathBuf>, cmd: ConfigCommand) -> CliResult {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:       {}", config.database_path().display());
                println!("  Backup dir:          {}", config.backup_dir().display());
                println!("  Backup before write: {}", config.storage.backup_before_write);
                println!("  Max backups:         {}", config.storage.max_backups);
                println!();
                println!("[Import]");
                println!(
                    "  Default sheet:       {}",
                    config.import.default_sheet.as_deref().unwrap_or("(first)")
                );
                println!("  Name column:         {}", config.import.name_column);
                println!();
                println!("[Verification]");
                println!("  Verifier label:      {}", config.verification.verifier_label);
                println!("  Bulk verifier label: {}", config.verification.bulk_verifier_label);
                println!();
                println!("[Validation]");
                println!(
                    "  Phone pattern:       {}",
                    config.validation.phone_pattern.as_deref().unwrap_or("(any)")
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", path.unwrap_or_else(Config::default_config_path).display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn print_caregiver_detail(c: &Caregiver) {
    let opt = |v: Option<u32>| v.map_or_else(String::new, |n| n.to_string());
    println!("Key:            {}", c.key);
    println!("Name:           {}", c.name);
    println!("Gender:         {}", c.gender);
    println!("Profession:     {}", c.profession);
    println!(
        "Date of birth:  {}",
        c.date_of_birth.map_or_else(String::new, |d| d.to_string())
    );
    println!("Age:            {}", opt(c.age));
    println!("Phone:          {}", c.phone_number);
    println!("Address:        {}", c.address);
    println!("Zonal leader:   {}", c.zonal_leader);
    println!("Bank:           {}", c.bank);
    println!("Account number: {}", c.account_number);
    println!("Number of kids: {}", opt(c.number_of_kids));
    println!("Last updated:   {}", c.last_updated.format("%Y-%m-%d %H:%M:%S UTC"));
}

fn print_caregivers(caregivers: &[Caregiver], format: OutputFormat) -> CliResult {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(caregivers)?),
        OutputFormat::Csv => write_csv(std::io::stdout().lock(), caregivers)?,
        OutputFormat::Table => {
            println!(
                "{:<12}  {:<28}  {:<16}  {:>4}  {:<20}",
                "KEY", "NAME", "PHONE", "AGE", "ZONAL LEADER"
            );
            for c in caregivers {
                println!(
                    "{:<12}  {:<28}  {:<16}  {:>4}  {:<20}",
                    c.key,
                    c.name,
                    c.phone_number,
                    c.age.map_or_else(String::new, |a| a.to_string()),
                    c.zonal_leader
                );
            }
            println!("{} caregiver(s)", caregivers.len());
        }
    }
    Ok(())
}

fn print_children(children: &[Child], format: OutputFormat) -> CliResult {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(children)?),
        OutputFormat::Csv => write_csv(std::io::stdout().lock(), children)?,
        OutputFormat::Table => {
            println!(
                "{:<20}  {:<24}  {:>4}  {:<16}  {:<16}",
                "NAME", "CAREGIVER", "AGE", "EDUCATION", "PHONE"
            );
            for c in children {
                println!(
                    "{:<20}  {:<24}  {:>4}  {:<16}  {:<16}",
                    c.name,
                    c.caregiver_name,
                    c.age.map_or_else(String::new, |a| a.to_string()),
                    c.education_level.map_or_else(String::new, |e| e.to_string()),
                    c.phone_number
                );
            }
            println!("{} child(ren)", children.len());
        }
    }
    Ok(())
}

fn print_names(names: &[UnverifiedName], format: OutputFormat) -> CliResult {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(names)?),
        OutputFormat::Csv => write_csv(std::io::stdout().lock(), names)?,
        OutputFormat::Table => {
            println!(
                "{:<12}  {:<28}  {:<9}  {:<10}  NOTES",
                "ID", "NAME", "STATUS", "UPLOADED"
            );
            for n in names {
                println!(
                    "{:<12}  {:<28}  {:<9}  {:<10}  {}",
                    n.unverified_id,
                    n.name,
                    n.status,
                    n.upload_date.format("%Y-%m-%d"),
                    n.notes
                );
            }
            println!("{} name(s)", names.len());
        }
    }
    Ok(())
}

fn print_counts(title: &str, counts: &[Count]) {
    if counts.is_empty() {
        return;
    }
    println!("[{title}]");
    for count in counts {
        println!("  {:<24} {:>6}", count.label, count.count);
    }
    println!();
}

fn print_summary(s: &Summary) {
    let rate = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |r| format!("{r:.1}%"));
    let avg = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |a| format!("{a:.1}"));

    println!("Registry Summary");
    println!("================");
    println!("Caregivers:                {}", s.total_caregivers);
    println!("Children:                  {}", s.total_children);
    println!("Average caregiver age:     {}", avg(s.average_caregiver_age));
    println!("Average child age:         {}", avg(s.average_child_age));
    println!("Enrollment rate:           {}", rate(s.enrollment_rate));
    println!("Higher education rate:     {}", rate(s.higher_education_rate));
    println!("Missing education level:   {}", s.missing_education);
    println!("Families without children: {}", s.families_without_children);
    println!("Large families:            {}", s.large_families);
    println!("School age, not in school: {}", s.school_age_not_in_school);
    println!("Orphaned children:         {}", s.orphaned_children);
    println!();

    print_counts("Caregivers by gender", &s.caregivers_by_gender);
    print_counts("Caregivers by age group", &s.caregivers_by_age_group);
    print_counts("Caregivers by zonal leader", &s.caregivers_by_zonal_leader);
    print_counts("Caregivers by profession", &s.caregivers_by_profession);
    print_counts("Children by gender", &s.children_by_gender);
    print_counts("Children by age group", &s.children_by_age_group);
    print_counts("Children by education", &s.children_by_education);

    println!("[Unverified names]");
    println!("  Pending:  {}", s.unverified.pending);
    println!("  Verified: {}", s.unverified.verified);
    println!("  Rejected: {}", s.unverified.rejected);
}
