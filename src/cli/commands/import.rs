use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use serde_json::json;

use crate::auth::AccessScope;
use crate::cli::utils::{output_error, output_import_report, output_success};
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::{DatabaseManager, MemoryStudentStore, PgStudentStore, StudentStore};
use crate::services::import::{parse_import_workbook, ImportOptions, ImportReport, Reconciler};

#[derive(Args)]
pub struct ImportArgs {
    #[arg(help = "Path to the .xlsx workbook")]
    pub file: PathBuf,

    #[arg(long, default_value_t = 0, help = "Actor id recorded as creator/updater")]
    pub actor: i64,

    #[arg(long, help = "Replace existing contacts of imported students")]
    pub replace_contacts: bool,

    #[arg(long, help = "Only accept rows of this school")]
    pub school_id: Option<i64>,

    #[arg(long, help = "Reconcile against an empty in-memory store; nothing is written")]
    pub dry_run: bool,
}

pub async fn handle(args: ImportArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;

    let decoded = match parse_import_workbook(&bytes) {
        Ok(decoded) => decoded,
        Err(e) => {
            output_error(&output_format, &e.to_string(), Some("WORKBOOK_ERROR"))?;
            anyhow::bail!("workbook rejected");
        }
    };
    tracing::info!(rows = decoded.rows.len(), contacts = decoded.contacts.len(), "decoded workbook");

    if decoded.rows.is_empty() {
        return output_success(&output_format, "Workbook has no student rows", Some(json!({ "total": 0 })));
    }

    let mut database = None;
    let store: Arc<dyn StudentStore> = if args.dry_run {
        Arc::new(MemoryStudentStore::new())
    } else {
        let manager = DatabaseManager::connect(&config().database).await?;
        let store: Arc<dyn StudentStore> = Arc::new(PgStudentStore::new(manager.pool()));
        database = Some(manager);
        store
    };

    let options = ImportOptions {
        replace_contacts: args.replace_contacts,
        scope: args.school_id.map_or(AccessScope::District, AccessScope::School),
    };
    let results = Reconciler::new(store)
        .reconcile_with(&decoded.rows, &decoded.contacts, args.actor, &options)
        .await;

    if let Some(manager) = database {
        manager.close().await;
    }

    output_import_report(&output_format, &ImportReport::from(results))
}
