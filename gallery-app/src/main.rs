use std::path::PathBuf;

use gallery_app::app::{AppConfig, GalleryApp, NoticeKind, Notifier};
use gallery_app::upload::SourceFile;
use gallery_app::view::ListPresenter;
use gallery_core::GalleryItem;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliMode {
    List,
    Search(String),
    Upload(Vec<PathBuf>),
    Delete(String),
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let Some(command) = args.next() else {
        return Ok(CliMode::List);
    };
    match command.as_str() {
        "list" => Ok(CliMode::List),
        "search" => {
            let term = args.next().unwrap_or_default();
            Ok(CliMode::Search(term))
        }
        "upload" => {
            let paths: Vec<PathBuf> = args.map(PathBuf::from).collect();
            if paths.is_empty() {
                anyhow::bail!("upload requires at least one file");
            }
            Ok(CliMode::Upload(paths))
        }
        "delete" => {
            let name = args
                .next()
                .ok_or_else(|| anyhow::anyhow!("delete requires a file name"))?;
            Ok(CliMode::Delete(name))
        }
        "--help" | "-h" | "help" => Ok(CliMode::Help),
        other => anyhow::bail!("unknown command: {other}"),
    }
}

fn print_usage() {
    println!("Usage: gallery-app [COMMAND]");
    println!("  list              Sync and print the gallery (default)");
    println!("  search <term>     Sync, then print items matching <term>");
    println!("  upload <files..>  Convert and upload image files");
    println!("  delete <name>     Delete one item by name");
}

/// Buffers materialized rows; stdout cannot retract lines already
/// printed, and live pagination re-renders from scratch on every page,
/// so output is flushed once after rendering settles.
#[derive(Default)]
struct StdoutPresenter {
    rows: Vec<String>,
}

impl StdoutPresenter {
    fn flush(&self) {
        for row in &self.rows {
            println!("{row}");
        }
    }
}

impl ListPresenter for StdoutPresenter {
    fn clear(&mut self) {
        self.rows.clear();
    }

    fn append(&mut self, items: &[GalleryItem]) {
        self.rows
            .extend(items.iter().map(|item| format!("{}\t{}", item.name, item.url)));
    }

    fn remove(&mut self, name: &str) {
        let prefix = format!("{name}\t");
        self.rows.retain(|row| !row.starts_with(&prefix));
    }
}

struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notice(&mut self, kind: NoticeKind, message: &str) {
        let tag = match kind {
            NoticeKind::Info => "info",
            NoticeKind::Warning => "warn",
            NoticeKind::Error => "error",
        };
        eprintln!("[gallery] {tag}: {message}");
    }

    fn progress(&mut self, percent: u8) {
        eprintln!("[gallery] {percent}%");
    }
}

/// No scroll events on a terminal, so keep extending the materialized
/// prefix until the filtered view is complete, then print it in one go.
async fn drain_view(app: &mut GalleryApp<StdoutPresenter, StderrNotifier>) {
    while app.view().rendered() < app.view().filtered().len() {
        app.render_more().await;
    }
    app.presenter().flush();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mode = parse_cli_mode(std::env::args())?;
    if mode == CliMode::Help {
        print_usage();
        return Ok(());
    }

    let config = AppConfig::from_env();
    let mut app = GalleryApp::new(&config, StdoutPresenter::default(), StderrNotifier)?;

    match mode {
        CliMode::List => {
            app.startup().await;
            drain_view(&mut app).await;
        }
        CliMode::Search(term) => {
            app.startup().await;
            app.search(&term).await;
            drain_view(&mut app).await;
        }
        CliMode::Upload(paths) => {
            let mut files = Vec::with_capacity(paths.len());
            for path in paths {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| anyhow::anyhow!("not a file: {}", path.display()))?;
                let bytes = tokio::fs::read(&path).await?;
                files.push(SourceFile { name, bytes });
            }
            app.upload_files(files).await;
        }
        CliMode::Delete(name) => {
            app.startup().await;
            if app.request_delete(&name) {
                app.confirm_delete().await;
            }
        }
        CliMode::Help => unreachable!(),
    }
    Ok(())
}
