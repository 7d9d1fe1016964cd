use chrono::Utc;
use clap::Parser;
use feed_i18n::TemplateTranslator;
use feed_model::ActivityGroup;
use feed_pages::{write_group_json, write_notification_html, Config};
use feed_ref::UserId;
use progress_bar::*;
use serde::Deserialize;
use serde_json::Value;
use std::{collections::HashMap, io, path::PathBuf};
use thiserror::Error as ThisError;

/// Render a feed export to static notification pages.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Feed export JSON file ({ "viewer": <id>, "groups": [...] })
    input: PathBuf,
    /// Output directory
    output: PathBuf,
    /// Translation catalog JSON file (template key -> localized template)
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[derive(Deserialize)]
struct FeedExport {
    viewer: UserId,
    groups: Vec<Value>,
}

#[derive(Debug, ThisError)]
enum Error {
    #[error("Failed to read input file: {0}")]
    ReadInput(#[source] io::Error),
    #[error("Failed to parse feed export: {0}")]
    ParseExport(#[source] serde_json::Error),
    #[error("Failed to read catalog file: {0}")]
    ReadCatalog(#[source] io::Error),
    #[error("Failed to parse catalog: {0}")]
    ParseCatalog(#[source] serde_json::Error),
    #[error("Failed to create output directory: {0}")]
    CreateDir(#[source] io::Error),
    #[error("Failed to write page: {0}")]
    WritePage(#[from] feed_pages::Error),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let raw = tokio::fs::read_to_string(&args.input)
        .await
        .map_err(Error::ReadInput)?;
    let export: FeedExport = serde_json::from_str(&raw).map_err(Error::ParseExport)?;

    let translator = match &args.catalog {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .map_err(Error::ReadCatalog)?;
            let catalog: HashMap<String, String> =
                serde_json::from_str(&raw).map_err(Error::ParseCatalog)?;
            TemplateTranslator::with_catalog(catalog)
        }
        None => TemplateTranslator::new(),
    };

    tokio::fs::create_dir_all(args.output.join("notification"))
        .await
        .map_err(Error::CreateDir)?;
    let config = Config {
        base_dir: args.output.clone(),
    };

    let viewer = export.viewer;
    let now = Utc::now();

    let mut rendered = 0usize;
    let mut skipped = 0usize;
    let mut unknown_verbs = 0usize;

    init_progress_bar(export.groups.len());
    set_progress_bar_action("Rendering", Color::Blue, Style::Bold);

    for (index, value) in export.groups.into_iter().enumerate() {
        let group = match ActivityGroup::from_json(value) {
            Ok(group) => group,
            Err(error) => {
                print_progress_bar_info(
                    "Skipped",
                    &format!("group {}: {}", index, error),
                    Color::Yellow,
                    Style::Normal,
                );
                skipped += 1;
                inc_progress_bar();
                continue;
            }
        };

        match feed_notify::resolve(&group, &viewer, &translator) {
            Ok(resolved) => {
                if !resolved.diagnostics.is_empty() {
                    unknown_verbs += 1;
                }
            }
            Err(error) => {
                print_progress_bar_info(
                    "Skipped",
                    &format!("group {}: {}", index, error),
                    Color::Yellow,
                    Style::Normal,
                );
                skipped += 1;
                inc_progress_bar();
                continue;
            }
        }

        let slug = group
            .id
            .clone()
            .unwrap_or_else(|| format!("group-{}", index));
        write_notification_html(&config, &slug, &group, &viewer, &translator, now).await?;
        write_group_json(&config, &slug, &group).await?;
        rendered += 1;
        inc_progress_bar();
    }

    finalize_progress_bar();
    println!(
        "Rendered {} notification pages ({} skipped, {} with unrecognized verbs)",
        rendered, skipped, unknown_verbs
    );

    Ok(())
}
