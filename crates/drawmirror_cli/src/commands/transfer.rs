//! Manual archive transfer: export to and import from files.

use super::{open_instance, CommandResult};
use drawmirror_sync_engine::{OfflineClient, PullConfig, PullOrchestrator};
use drawmirror_sync_server::{ExportConfig, ExportService};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Writes the instance's dataset to `out`.
pub fn export(path: &Path, out: &Path, include_nodes: bool) -> CommandResult {
    let instance = open_instance(path)?;
    let service = ExportService::new(
        Arc::clone(instance.store()),
        Arc::clone(instance.registry()),
        ExportConfig::new().with_include_nodes(include_nodes),
    );
    let export = service.export()?;

    let tmp = partial_path(out);
    fs::write(&tmp, &export.body)?;
    fs::rename(&tmp, out)?;

    println!(
        "Exported {} drawings ({} bytes) to {}",
        instance.store().len(),
        export.body.len(),
        out.display()
    );
    Ok(())
}

/// Sibling path the archive is written to before the rename.
fn partial_path(out: &Path) -> PathBuf {
    let mut name = out.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Replaces the instance's dataset with the archive in `file`.
pub fn import(path: &Path, file: &Path) -> CommandResult {
    let bytes = fs::read(file)?;
    let instance = open_instance(path)?;
    let orchestrator = PullOrchestrator::new(
        PullConfig::new(),
        OfflineClient,
        instance.replace_engine(),
    );

    let label = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    let result = orchestrator.pull_from_bytes(&label, &bytes)?;

    println!(
        "Imported {} drawings from {} (replaced {})",
        result.record_count,
        file.display(),
        result.previous_count
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawmirror_core::{verify, Config, Instance};
    use tempfile::TempDir;

    fn store_len(path: &Path) -> usize {
        Instance::open(&Config::new().data_dir(path))
            .unwrap()
            .store()
            .len()
    }

    #[test]
    fn export_then_import_elsewhere() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a");
        let target = dir.path().join("b");
        let file = dir.path().join("a.archive");

        {
            let instance = open_instance(&source).unwrap();
            for i in 0..4 {
                instance.store().create(&format!("drawing {i}")).unwrap();
            }
        }
        {
            let instance = open_instance(&target).unwrap();
            instance.store().create("old").unwrap();
        }

        export(&source, &file, true).unwrap();
        assert_eq!(verify(&fs::read(&file).unwrap()).unwrap().record_count, 4);

        import(&target, &file).unwrap();
        assert_eq!(store_len(&target), 4);
    }

    #[test]
    fn export_to_a_tmp_named_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a");
        let file = dir.path().join("snapshot.tmp");
        open_instance(&source).unwrap().store().create("one").unwrap();

        assert_ne!(partial_path(&file), file);
        export(&source, &file, false).unwrap();
        assert_eq!(verify(&fs::read(&file).unwrap()).unwrap().record_count, 1);
        assert!(!partial_path(&file).exists());
    }

    #[test]
    fn corrupt_import_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("b");
        let file = dir.path().join("bad.archive");
        {
            let instance = open_instance(&target).unwrap();
            instance.store().create("keep").unwrap();
        }
        let mut bytes = drawmirror_testkit::sample_archive_bytes(3);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&file, bytes).unwrap();

        assert!(import(&target, &file).is_err());
        assert_eq!(store_len(&target), 1);
    }
}
