use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use tracing::{info, warn};
use vault_core::paths::settings_path;
use vault_core::preview::{format_size, truncate_name, PreviewKind};
use vault_core::{AuthMode, ObjectStore, SessionController, SessionError, VaultSettings};
use vault_store::{BatchReport, FileSummary, NewFile, VaultFile};

use crate::{mime, prompt, UnlockArgs};

pub async fn status(session: &mut SessionController, data_dir: &Path) -> Result<()> {
    let mode = session.check_initial_mode().await?;
    println!("data dir: {}", data_dir.display());
    println!("database: {}", session.store_path().display());
    match mode {
        AuthMode::Setup => println!("mode:     SETUP (run `obsidian-vault init`)"),
        other => println!("mode:     {other}"),
    }
    Ok(())
}

pub async fn init(
    session: &mut SessionController,
    data_dir: &Path,
    settings: &VaultSettings,
    yes: bool,
) -> Result<()> {
    match session.check_initial_mode().await? {
        AuthMode::Setup => {}
        AuthMode::Login => bail!("vault already has a passcode"),
        other => bail!("unexpected session mode {other}"),
    }

    let (password, confirm) = prompt::new_password()?;
    session
        .submit_setup(&password, &confirm)
        .await
        .map_err(rejection)?;

    if !yes && !prompt::confirm("Confirm fingerprint enrollment scan")? {
        bail!("enrollment cancelled; no passcode was stored");
    }
    session.confirm_recovery().await?;
    if write_settings_if_missing(data_dir, settings)? {
        info!("wrote {}", settings_path(data_dir).display());
    }
    println!("Vault initialised at {}", session.store_path().display());
    Ok(())
}

/// Leave an editable `settings.json` next to a new vault.
fn write_settings_if_missing(data_dir: &Path, settings: &VaultSettings) -> Result<bool> {
    if settings_path(data_dir).exists() {
        return Ok(false);
    }
    settings.save(data_dir)?;
    Ok(true)
}

/// Exit error for a rejected setup or login. Input errors get a retry hint;
/// anything else passes through unchanged.
fn rejection(e: SessionError) -> anyhow::Error {
    if e.is_input_error() {
        anyhow!("{e}; nothing was changed, try again")
    } else {
        anyhow::Error::new(e)
    }
}

/// Bring the session to UNLOCKED, by passcode or by the biometric override.
pub async fn unlock(session: &mut SessionController, args: UnlockArgs) -> Result<()> {
    match session.check_initial_mode().await? {
        AuthMode::Login => {}
        AuthMode::Setup => bail!("vault has no passcode yet; run `obsidian-vault init` first"),
        other => bail!("unexpected session mode {other}"),
    }

    if args.biometric {
        warn!("biometric override skips the passcode check");
        session.request_recovery().await?;
        if !prompt::confirm("Confirm fingerprint scan")? {
            session.return_to_login().await?;
            bail!("scan cancelled");
        }
        session.confirm_recovery().await?;
        return Ok(());
    }

    let attempt = prompt::password_once("Passcode")?;
    session.submit_login(&attempt).await.map_err(rejection)?;
    Ok(())
}

pub async fn add(session: &SessionController, paths: &[PathBuf], mime_override: Option<&str>) -> Result<()> {
    let store = session.files()?;
    let mut unreadable = 0usize;
    let mut batch = Vec::with_capacity(paths.len());
    for path in paths {
        match read_upload(path, mime_override) {
            Ok(file) => batch.push(file),
            Err(e) => {
                unreadable += 1;
                eprintln!("failed  {}: {e:#}", path.display());
            }
        }
    }

    let report = store.save_files(batch).await;
    for file in &report.succeeded {
        println!("saved   {}  {}", file.id, file.name);
    }
    finish_batch("upload", &report, unreadable)
}

fn read_upload(path: &Path, mime_override: Option<&str>) -> Result<NewFile> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("no usable file name"))?;
    let mime_type = mime_override.unwrap_or_else(|| mime::guess(path));
    Ok(NewFile::new(name, mime_type, data))
}

pub async fn list(session: &SessionController, search: Option<&str>, json: bool) -> Result<()> {
    let store = session.files()?;
    let files = match search {
        Some(query) => store.search_files(query).await?,
        None => store.get_files().await?,
    };

    if json {
        let summaries: Vec<FileSummary> = files.iter().map(VaultFile::summary).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if files.is_empty() {
        println!("No files stored.");
        return Ok(());
    }
    for file in &files {
        println!("{}", render_row(file));
    }
    let total = store.file_count().await?;
    println!("{} of {total} file(s)", files.len());
    Ok(())
}

fn render_row(file: &VaultFile) -> String {
    let created = file
        .created_at_utc()
        .map(|at| at.with_timezone(&Local).to_rfc3339())
        .unwrap_or_else(|| file.created_at.to_string());
    let kind = match PreviewKind::from_mime(&file.mime_type) {
        PreviewKind::Image => "image",
        PreviewKind::Video => "video",
        PreviewKind::Document => "document",
    };
    format!(
        "{}  {:<8}  {:<24}  {:>10}  {}  {}",
        file.id,
        kind,
        file.mime_type,
        format_size(file.size),
        created,
        truncate_name(&file.name)
    )
}

/// Write each file into `dir` under its stored name. Existing files are
/// never overwritten; a clash gets a numbered name instead.
pub async fn export(session: &SessionController, ids: &[String], dir: &Path) -> Result<()> {
    let store = session.files()?;
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut report: BatchReport<PathBuf, anyhow::Error> = BatchReport::new();
    for id in ids {
        let outcome = export_one(store, id, dir).await;
        if let Ok(path) = &outcome {
            println!("exported {id}  {}", path.display());
        }
        report.record(id.as_str(), outcome);
    }
    finish_batch("export", &report, 0)
}

async fn export_one(store: &ObjectStore, id: &str, dir: &Path) -> Result<PathBuf> {
    let file = store
        .get_file(id)
        .await?
        .ok_or_else(|| anyhow!("no file with id {id}"))?;
    let target = write_new_file(dir, export_name(&file), &file.data)?;
    info!("exported {} ({} bytes) to {}", file.id, file.size, target.display());
    Ok(target)
}

/// Stored names are display-only; keep the last path component and fall
/// back to the id when nothing usable is left.
fn export_name(file: &VaultFile) -> &str {
    Path::new(&file.name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(&file.id)
}

const MAX_NAME_ATTEMPTS: u32 = 1000;

fn write_new_file(dir: &Path, name: &str, data: &[u8]) -> Result<PathBuf> {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let candidate = if attempt == 1 {
            dir.join(name)
        } else {
            dir.join(format!("{stem} ({attempt}){ext}"))
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut out) => {
                out.write_all(data)
                    .with_context(|| format!("writing {}", candidate.display()))?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("creating {}", candidate.display()));
            }
        }
    }
    bail!("no free file name for {name} in {}", dir.display())
}

pub async fn remove(session: &SessionController, ids: &[String]) -> Result<()> {
    let store = session.files()?;
    let report = store.delete_files(ids).await;
    for id in &report.succeeded {
        println!("deleted {id}");
    }
    finish_batch("delete", &report, 0)
}

pub async fn reset(session: &SessionController) -> Result<()> {
    session.files()?.reset().await?;
    warn!("vault wiped");
    println!("Vault reset. Run `obsidian-vault init` to set a new passcode.");
    Ok(())
}

/// Print per-item failures and fail the command if any item failed.
fn finish_batch<T, E: Display>(
    what: &str,
    report: &BatchReport<T, E>,
    extra_failures: usize,
) -> Result<()> {
    for failure in &report.failed {
        eprintln!("failed  {}: {:#}", failure.item, failure.error);
    }
    let failed = report.failed.len() + extra_failures;
    if failed > 0 {
        bail!("{what}: {failed} of {} item(s) failed", report.len() + extra_failures);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use vault_core::StoreConfig;

    async fn unlocked_session(dir: &Path) -> SessionController {
        let store = ObjectStore::new(StoreConfig::new(dir.join("vault.db")));
        store.set_password("abcd").await.unwrap();
        let mut session = SessionController::new(store);
        session.check_initial_mode().await.unwrap();
        session.submit_login("abcd").await.unwrap();
        session
    }

    async fn stored(session: &SessionController, name: &str, body: &[u8]) -> String {
        session
            .files()
            .unwrap()
            .save_file(NewFile::new(name, "text/plain", body.to_vec()))
            .await
            .unwrap()
            .id
    }

    fn file(name: &str, mime_type: &str, size: i64) -> VaultFile {
        VaultFile {
            id: "0b9f8c1e-5c6e-4a57-9d0f-2f4b1d9e7a10".to_string(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size,
            data: Vec::new(),
            created_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn row_shows_kind_size_and_name() {
        let row = render_row(&file("beach.png", "image/png", 1_572_864));
        assert!(row.starts_with("0b9f8c1e-5c6e-4a57-9d0f-2f4b1d9e7a10  image"));
        assert!(row.contains("image/png"));
        assert!(row.contains("1.50 MB"));
        assert!(row.ends_with("beach.png"));
    }

    #[test]
    fn row_truncates_long_names() {
        let long = format!("{}.pdf", "x".repeat(120));
        let row = render_row(&file(&long, "application/pdf", 10));
        assert!(row.contains("document"));
        assert!(row.contains("..."));
        assert!(!row.contains(&long));
    }

    #[test]
    fn read_upload_uses_override_or_guess() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, b"# hi").unwrap();

        let guessed = read_upload(&path, None).unwrap();
        assert_eq!(guessed.name, "notes.md");
        assert_eq!(guessed.mime_type, "text/markdown");
        assert_eq!(guessed.data, b"# hi");

        let forced = read_upload(&path, Some("text/plain")).unwrap();
        assert_eq!(forced.mime_type, "text/plain");
    }

    #[test]
    fn read_upload_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_upload(&dir.path().join("absent.bin"), None).is_err());
    }

    #[tokio::test]
    async fn export_writes_each_file_and_reports_missing_ids() {
        let vault = tempdir().unwrap();
        let session = unlocked_session(vault.path()).await;
        let first = stored(&session, "notes.txt", b"one").await;
        let second = stored(&session, "notes.txt", b"two").await;
        let photo = stored(&session, "photo.png", b"png").await;

        let out = vault.path().join("out");
        let ids = vec![first, "missing".to_string(), second, photo];
        let err = export(&session, &ids, &out).await.unwrap_err();
        assert!(err.to_string().contains("1 of 4"), "got {err}");

        // Earlier and later items are written even though one id failed.
        assert_eq!(std::fs::read(out.join("notes.txt")).unwrap(), b"one");
        assert_eq!(std::fs::read(out.join("notes (2).txt")).unwrap(), b"two");
        assert_eq!(std::fs::read(out.join("photo.png")).unwrap(), b"png");
    }

    #[tokio::test]
    async fn export_never_overwrites_existing_files() {
        let vault = tempdir().unwrap();
        let session = unlocked_session(vault.path()).await;
        let id = stored(&session, "report.pdf", b"new").await;

        let out = tempdir().unwrap();
        std::fs::write(out.path().join("report.pdf"), b"old").unwrap();

        export(&session, &[id], out.path()).await.unwrap();
        assert_eq!(std::fs::read(out.path().join("report.pdf")).unwrap(), b"old");
        assert_eq!(std::fs::read(out.path().join("report (2).pdf")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn export_requires_unlocked_session() {
        let vault = tempdir().unwrap();
        let store = ObjectStore::new(StoreConfig::new(vault.path().join("vault.db")));
        let session = SessionController::new(store);

        let out = vault.path().join("out");
        let err = export(&session, &["any".to_string()], &out).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<SessionError>(), Some(SessionError::Locked)));
        assert!(!out.exists());
    }

    #[test]
    fn export_name_drops_directories() {
        let mut f = file("../../etc/passwd", "text/plain", 1);
        assert_eq!(export_name(&f), "passwd");
        f.name = "..".to_string();
        assert_eq!(export_name(&f), f.id);
    }

    #[test]
    fn input_errors_get_a_retry_hint() {
        let err = rejection(SessionError::AccessDenied);
        assert!(err.to_string().contains("try again"));

        let err = rejection(SessionError::TooShort { min: 4, actual: 2 });
        assert!(err.to_string().starts_with("Password too short"));

        // Non-input errors keep their type for callers that downcast.
        let err = rejection(SessionError::Locked);
        assert!(matches!(err.downcast_ref::<SessionError>(), Some(SessionError::Locked)));
    }

    #[test]
    fn settings_file_written_once() {
        let dir = tempdir().unwrap();
        let settings = VaultSettings::default();
        assert!(write_settings_if_missing(dir.path(), &settings).unwrap());
        assert_eq!(VaultSettings::load(dir.path()).unwrap(), settings);

        std::fs::write(settings_path(dir.path()), br#"{"max_connections":2}"#).unwrap();
        assert!(!write_settings_if_missing(dir.path(), &settings).unwrap());
        assert_eq!(VaultSettings::load(dir.path()).unwrap().max_connections, 2);
    }
}
