//! End-to-end compile and install scenarios against real directories

use std::cell::Cell;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use modlist::error::DirectiveError;
use modlist::fs::{FileSystem, NativeFileSystem};
use modlist::modlist::{InlineBlob, InlineFile};
use modlist::{
    Compiler, CompilerConfig, Directive, Hash, InstallError, InstallReport, Installer, InstallerConfig, ModList,
};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

struct TestEnv {
    root: TempDir,
    mo2: PathBuf,
    game: PathBuf,
    downloads: PathBuf,
    install: PathBuf,
    seed: Cell<u64>,
}

impl TestEnv {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let root = tempfile::tempdir().unwrap();
        let mo2 = root.path().join("mo2");
        let game = root.path().join("game");
        let downloads = root.path().join("downloads");
        let install = root.path().join("install");
        for dir in [&mo2, &game, &downloads] {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::create_dir_all(mo2.join("mods")).unwrap();
        Self {
            root,
            mo2,
            game,
            downloads,
            install,
            seed: Cell::new(0x9e37_79b9_7f4a_7c15),
        }
    }

    /// Deterministic bytes, different on every call
    fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut x = self.seed.get();
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            out.push((x >> 24) as u8);
        }
        self.seed.set(x);
        out
    }

    fn write(path: &Path, data: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    fn add_profile(&self, name: &str) {
        Self::write(&self.mo2.join("profiles").join(name).join("modlist.txt"), b"+Test Mod\n");
    }

    fn add_mod_file(&self, mod_name: &str, rel: &str, size: usize) -> PathBuf {
        let path = self.mo2.join("mods").join(mod_name).join(rel);
        Self::write(&path, &self.random_bytes(size));
        path
    }

    fn add_game_file(&self, rel: &str, size: usize) -> PathBuf {
        let path = self.game.join(rel);
        Self::write(&path, &self.random_bytes(size));
        path
    }

    /// Write a zip into the downloads folder and return its file name
    fn add_download(&self, name: &str, files: &[(&str, Vec<u8>)]) -> String {
        let mut zip = zip::ZipWriter::new(File::create(self.downloads.join(name)).unwrap());
        for (entry, data) in files {
            zip.start_file(*entry, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
        name.to_string()
    }

    fn compiler_config(&self, profile: &str) -> CompilerConfig {
        CompilerConfig::new(&self.mo2, &self.game, &self.downloads)
            .with_profile(profile)
            .with_name("Sanity")
            .with_game("SkyrimSpecialEdition")
    }

    /// Compile, then round-trip the list through its package format
    fn compile(&self, profile: &str) -> ModList {
        let list = Compiler::new(self.compiler_config(profile)).compile().unwrap();
        let package = self.root.path().join("sanity.modlist");
        list.save(&package).unwrap();
        let loaded = ModList::load(&package).unwrap();
        assert_eq!(loaded, list);
        loaded
    }

    async fn install(&self, list: ModList) -> Result<InstallReport, InstallError> {
        let config = InstallerConfig::new(&self.install, &self.downloads, &self.game);
        Installer::new(config, list).install().await
    }

    async fn compile_and_install(&self, profile: &str) -> ModList {
        let list = self.compile(profile);
        self.install(list.clone()).await.unwrap();
        list
    }

    fn installed(&self, rel: &str) -> PathBuf {
        self.install.join(rel)
    }

    fn verify_installed_file(&self, mod_name: &str, rel: &str) {
        let src = std::fs::read(self.mo2.join("mods").join(mod_name).join(rel)).unwrap();
        let dst = std::fs::read(self.installed(&format!("mods/{}/{}", mod_name, rel))).unwrap();
        assert_eq!(src, dst, "installed mods/{}/{} differs from its source", mod_name, rel);
    }

    fn verify_installed_game_file(&self, rel: &str) {
        let src = std::fs::read(self.game.join(rel)).unwrap();
        let dst = std::fs::read(self.installed(&format!("Game Folder Files/{}", rel))).unwrap();
        assert_eq!(src, dst);
    }
}

fn directive<'a>(list: &'a ModList, to: &str) -> &'a Directive {
    list.directives
        .iter()
        .find(|d| d.to() == to)
        .unwrap_or_else(|| panic!("no directive for {}", to))
}

#[tokio::test]
async fn test_direct_match() {
    let env = TestEnv::new();
    env.add_profile("Default");
    let pex = env.add_mod_file("Test Mod", "Data/scripts/test.pex", 10);
    env.add_download("mod.zip", &[("baz/biz.pex", std::fs::read(&pex).unwrap())]);

    let list = env.compile_and_install("Default").await;

    assert_eq!(directive(&list, "mods/Test Mod/Data/scripts/test.pex").kind(), "FromArchive");
    env.verify_installed_file("Test Mod", "Data/scripts/test.pex");
    assert_eq!(std::fs::read(env.installed("profiles/Default/modlist.txt")).unwrap(), b"+Test Mod\n");
}

#[tokio::test]
async fn test_direct_match_from_game_folder() {
    let env = TestEnv::new();
    env.add_profile("Default");
    let pex = env.add_game_file("enbstuff/test.pex", 10);
    env.add_download("enb.zip", &[("baz/biz.pex", std::fs::read(&pex).unwrap())]);

    env.compile_and_install("Default").await;

    env.verify_installed_game_file("enbstuff/test.pex");
}

#[tokio::test]
async fn test_game_files_ignored_when_override_exists_at_compile() {
    let env = TestEnv::new();
    env.add_profile("Default");
    let pex = env.add_game_file("enbstuff/test.pex", 10);
    std::fs::create_dir_all(env.mo2.join("Game Folder Files")).unwrap();
    env.add_download("enb.zip", &[("baz/biz.pex", std::fs::read(&pex).unwrap())]);

    let list = env.compile_and_install("Default").await;

    assert!(list.directives.iter().all(|d| !d.to().starts_with("Game Folder Files/")));
    assert!(!env.installed("Game Folder Files/enbstuff/test.pex").is_file());
}

#[tokio::test]
async fn test_override_directory_is_never_written() {
    let env = TestEnv::new();
    env.add_profile("Default");
    let pex = env.add_game_file("enbstuff/test.pex", 10);
    env.add_download("enb.zip", &[("baz/biz.pex", std::fs::read(&pex).unwrap())]);
    let mut list = env.compile("Default");
    let shipped = b"[ENB]\nUsePatchSpeedhackWithoutGraphics=false\n";
    let id = list.blobs.insert(InlineBlob::new(shipped.to_vec()));
    list.directives.push(Directive::InlineFile(InlineFile {
        to: "overrides/enbseries.ini".to_string(),
        hash: Hash::of(shipped),
        size: shipped.len() as u64,
        source_data_id: id,
    }));

    let mine = env.installed("overrides/enbseries.ini");
    TestEnv::write(&mine, b"my own tweaks");
    TestEnv::write(&env.installed("overrides/readme.txt"), b"notes");

    let report = env.install(list).await.unwrap();

    assert_eq!(report.overridden, 1);
    assert_eq!(std::fs::read(&mine).unwrap(), b"my own tweaks");
    assert!(env.installed("overrides/readme.txt").is_file());
    env.verify_installed_game_file("enbstuff/test.pex");
}

#[tokio::test]
async fn test_deleted_game_file_is_restored_on_reinstall() {
    let env = TestEnv::new();
    env.add_profile("Default");
    let pex = env.add_game_file("enbstuff/test.pex", 10);
    env.add_download("enb.zip", &[("baz/biz.pex", std::fs::read(&pex).unwrap())]);
    let list = env.compile_and_install("Default").await;

    let installed = env.installed("Game Folder Files/enbstuff/test.pex");
    std::fs::remove_file(&installed).unwrap();
    let stale = env.installed("Game Folder Files/enbstuff/old.pex");
    TestEnv::write(&stale, b"left over");

    let report = env.install(list).await.unwrap();

    assert_eq!(report.written, 1);
    assert_eq!(report.overridden, 0);
    assert_eq!(report.deleted, 1);
    env.verify_installed_game_file("enbstuff/test.pex");
    assert!(!stale.exists());
}

#[tokio::test]
async fn test_duplicate_files_are_copied() {
    let env = TestEnv::new();
    env.add_profile("Default");
    let pex = env.add_mod_file("Test Mod", "Data/scripts/test.pex", 10);
    std::fs::copy(&pex, pex.with_extension("pex.copy")).unwrap();
    env.add_download("mod.zip", &[("baz/biz.pex", std::fs::read(&pex).unwrap())]);

    let list = env.compile_and_install("Default").await;

    assert_eq!(list.archives.len(), 1);
    env.verify_installed_file("Test Mod", "Data/scripts/test.pex");
    env.verify_installed_file("Test Mod", "Data/scripts/test.pex.copy");
}

#[tokio::test]
async fn test_updating() {
    let env = TestEnv::new();
    env.add_profile("Default");
    let unchanged = env.add_mod_file("Test Mod", "Data/scripts/unchanged.pex", 10);
    let deleted = env.add_mod_file("Test Mod", "Data/scripts/deleted.pex", 10);
    let modified = env.add_mod_file("Test Mod", "Data/scripts/modified.pex", 10);
    env.add_download(
        "mod.zip",
        &[
            ("baz/unchanged.pex", std::fs::read(&unchanged).unwrap()),
            ("baz/deleted.pex", std::fs::read(&deleted).unwrap()),
            ("baz/modified.pex", std::fs::read(&modified).unwrap()),
        ],
    );

    env.compile_and_install("Default").await;
    for name in ["unchanged", "deleted", "modified"] {
        env.verify_installed_file("Test Mod", &format!("Data/scripts/{}.pex", name));
    }

    let unchanged_path = env.installed("mods/Test Mod/Data/scripts/unchanged.pex");
    let deleted_path = env.installed("mods/Test Mod/Data/scripts/deleted.pex");
    let modified_path = env.installed("mods/Test Mod/Data/scripts/modified.pex");
    let extra_path = env.installed("mods/Test Mod/something_i_made.foo");
    let extra_folder = env.installed("mods/Test Mod/folder_i_made");

    TestEnv::write(&extra_path, b"bleh");
    std::fs::create_dir_all(&extra_folder).unwrap();
    std::fs::write(&modified_path, b"random data").unwrap();
    std::fs::remove_file(&deleted_path).unwrap();

    // A rewrite would move the timestamp off this value
    let long_ago = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
    NativeFileSystem.set_modified(&unchanged_path, long_ago).unwrap();
    NativeFileSystem.set_modified(&modified_path, long_ago).unwrap();

    let report = env.install(env.compile("Default")).await.unwrap();

    for name in ["unchanged", "deleted", "modified"] {
        env.verify_installed_file("Test Mod", &format!("Data/scripts/{}.pex", name));
    }
    assert_eq!(report.written, 2);
    assert_eq!(report.deleted, 1);
    assert_eq!(NativeFileSystem.modified(&unchanged_path).unwrap(), long_ago);
    assert_ne!(NativeFileSystem.modified(&modified_path).unwrap(), long_ago);
    assert!(!extra_path.exists());
    assert!(!extra_folder.exists());
}

#[tokio::test]
async fn test_cleaned_esm() {
    let env = TestEnv::new();
    env.add_profile("Default");
    env.add_mod_file("Cleaned ESMs", "Update.esm", 10);
    let game_file = env.add_game_file("Data/Update.esm", 20);

    let list = env.compile_and_install("Default").await;

    assert_eq!(directive(&list, "mods/Cleaned ESMs/Update.esm").kind(), "CleanedEsm");
    env.verify_installed_file("Cleaned ESMs", "Update.esm");

    // The game was updated underneath the list
    let installed = env.installed("mods/Cleaned ESMs/Update.esm");
    std::fs::remove_file(&installed).unwrap();
    TestEnv::write(&game_file, &env.random_bytes(20));

    let err = env.install(list).await.unwrap_err();
    assert!(matches!(err, InstallError::InvalidGameEsm { .. }), "got {:?}", err);
    assert!(!installed.exists());
}

#[tokio::test]
async fn test_local_paths_are_remapped_on_install() {
    let env = TestEnv::new();
    env.add_profile("Default");
    let mo2 = env.mo2.to_string_lossy().into_owned();
    let ini = format!("[Paths]\nmods={}/mods\n", mo2);
    TestEnv::write(&env.mo2.join("profiles/Default/settings.ini"), ini.as_bytes());

    let list = env.compile("Default");
    assert_eq!(directive(&list, "profiles/Default/settings.ini").kind(), "RemappedInlineFile");

    env.install(list.clone()).await.unwrap();
    let installed = std::fs::read_to_string(env.installed("profiles/Default/settings.ini")).unwrap();
    assert_eq!(installed, format!("[Paths]\nmods={}/mods\n", env.install.to_string_lossy()));

    let report = env.install(list).await.unwrap();
    assert_eq!(report.written, 0);
}

#[tokio::test]
async fn test_unmodified_inlined_files_are_pulled_from_archives() {
    let env = TestEnv::new();
    env.add_profile("Default");
    let ini = env.add_mod_file("Test Mod", "foo.ini", 10);
    env.add_download("mod.zip", &[("baz/biz.pex", std::fs::read(&ini).unwrap())]);

    let list = env.compile_and_install("Default").await;

    assert_eq!(directive(&list, "mods/Test Mod/foo.ini").kind(), "FromArchive");
}

#[tokio::test]
async fn test_modified_ini_files_are_patched_against_installation_archive() {
    let env = TestEnv::new();
    env.add_profile("Default");
    let ini = env.add_mod_file("Test Mod", "foo.ini", 10);
    let archive = env.add_download("Test Mod-1-0.zip", &[("baz/foo.ini", std::fs::read(&ini).unwrap())]);
    // A same-named entry elsewhere must lose to the recorded installation archive
    env.add_download("decoy.zip", &[("foo.ini", b"edited by hand, edited by hand?".to_vec())]);
    TestEnv::write(
        &env.mo2.join("mods/Test Mod/meta.ini"),
        format!("[General]\ninstallationFile={}\n", archive).as_bytes(),
    );
    std::fs::write(&ini, "edited by hand, edited by hand!").unwrap();

    let list = env.compile_and_install("Default").await;

    let Directive::PatchedFromArchive(patched) = directive(&list, "mods/Test Mod/foo.ini") else {
        panic!("expected a patched directive");
    };
    let expected_archive = list.archives.iter().find(|a| a.name == archive).unwrap();
    assert_eq!(patched.archive_hash_path.archive, expected_archive.hash);
    assert_eq!(patched.archive_hash_path.path, "baz/foo.ini");
    env.verify_installed_file("Test Mod", "foo.ini");
    assert_eq!(directive(&list, "mods/Test Mod/meta.ini").kind(), "InlineFile");
}

#[tokio::test]
async fn test_tagged_mods_are_embedded() {
    let env = TestEnv::new();
    env.add_profile("Default");
    let pex = env.add_mod_file("Tagged", "Data/scripts/test.pex", 10);
    TestEnv::write(
        &env.mo2.join("mods/Tagged/meta.ini"),
        b"[General]\nnotes=please WABBAJACK_INCLUDE this\n",
    );
    env.add_download("mod.zip", &[("baz/biz.pex", std::fs::read(&pex).unwrap())]);

    let list = env.compile_and_install("Default").await;

    assert_eq!(directive(&list, "mods/Tagged/Data/scripts/test.pex").kind(), "InlineFile");
    assert!(list.archives.is_empty());
    env.verify_installed_file("Tagged", "Data/scripts/test.pex");
}

#[tokio::test]
async fn test_other_profiles_are_left_out() {
    let env = TestEnv::new();
    env.add_profile("Default");
    env.add_profile("Experimental");

    let list = env.compile_and_install("Default").await;

    assert!(list.directives.iter().all(|d| !d.to().starts_with("profiles/Experimental/")));
    assert!(!env.installed("profiles/Experimental").exists());
}

#[tokio::test]
async fn test_recompiling_is_deterministic() {
    let env = TestEnv::new();
    env.add_profile("Default");
    for i in 0..8 {
        let pex = env.add_mod_file("Test Mod", &format!("Data/scripts/{}.pex", i), 64);
        env.add_download(&format!("mod{}.zip", i), &[("x.pex", std::fs::read(&pex).unwrap())]);
    }
    let ini = env.add_mod_file("Test Mod", "edited.ini", 300);
    let mut edited = std::fs::read(&ini).unwrap();
    env.add_download("ini.zip", &[("edited.ini", edited.clone())]);
    edited[150] ^= 0xff;
    std::fs::write(&ini, &edited).unwrap();

    let first = env.compile("Default");
    let second = env.compile("Default");
    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[tokio::test]
async fn test_missing_archive_reports_every_affected_file() {
    let env = TestEnv::new();
    env.add_profile("Default");
    let a = env.add_mod_file("Test Mod", "a.pex", 10);
    let b = env.add_mod_file("Test Mod", "b.pex", 10);
    env.add_download(
        "mod.zip",
        &[("a.pex", std::fs::read(&a).unwrap()), ("b.pex", std::fs::read(&b).unwrap())],
    );
    let list = env.compile("Default");
    std::fs::remove_file(env.downloads.join("mod.zip")).unwrap();

    let err = env.install(list).await.unwrap_err();
    let InstallError::Failures(failures) = err else {
        panic!("expected failures, got {:?}", err);
    };
    let failed: Vec<_> = failures.iter().map(|f| f.to.as_str()).collect();
    assert_eq!(failed, vec!["mods/Test Mod/a.pex", "mods/Test Mod/b.pex"]);
    assert!(failures.iter().all(|f| matches!(f.error, DirectiveError::ArchiveMissing { .. })));
    assert!(env.installed("profiles/Default/modlist.txt").is_file());
}

#[tokio::test]
async fn test_duplicate_targets_are_rejected_before_install() {
    let env = TestEnv::new();
    env.add_profile("Default");
    let mut list = env.compile("Default");
    let first = list.directives[0].clone();
    list.directives.push(first);

    let err = env.install(list).await.unwrap_err();
    assert!(matches!(err, InstallError::InvalidModList(_)), "got {:?}", err);
    assert!(!env.install.exists());
}

#[tokio::test]
async fn test_targets_outside_install_dir_are_rejected() {
    let env = TestEnv::new();
    env.add_profile("Default");
    let mut list = env.compile("Default");
    let Some(Directive::InlineFile(inline)) = list.directives.first_mut() else {
        panic!("expected the profile file to be inlined");
    };
    inline.to = "../escaped.txt".to_string();

    let err = env.install(list).await.unwrap_err();
    assert!(matches!(err, InstallError::InvalidModList(_)), "got {:?}", err);
    assert!(!env.root.path().join("escaped.txt").exists());
    assert!(!env.install.exists());
}

#[tokio::test]
async fn test_changed_patch_base_fails_only_that_file() {
    let env = TestEnv::new();
    env.add_profile("Default");
    let ini = env.add_mod_file("Test Mod", "foo.ini", 40);
    let pex = env.add_mod_file("Test Mod", "a.pex", 10);
    let archive = env.add_download(
        "Test Mod-1-0.zip",
        &[
            ("baz/foo.ini", std::fs::read(&ini).unwrap()),
            ("baz/foo_alt.ini", env.random_bytes(40)),
            ("a.pex", std::fs::read(&pex).unwrap()),
        ],
    );
    TestEnv::write(
        &env.mo2.join("mods/Test Mod/meta.ini"),
        format!("[General]\ninstallationFile={}\n", archive).as_bytes(),
    );
    let mut edited = std::fs::read(&ini).unwrap();
    edited[5] ^= 0xff;
    std::fs::write(&ini, &edited).unwrap();

    let mut list = env.compile("Default");
    let patched = list
        .directives
        .iter_mut()
        .find_map(|d| match d {
            Directive::PatchedFromArchive(p) if p.to == "mods/Test Mod/foo.ini" => Some(p),
            _ => None,
        })
        .expect("foo.ini should be patched");
    // The entry the patch was made against no longer holds the same bytes
    patched.archive_hash_path.path = "baz/foo_alt.ini".to_string();

    let err = env.install(list).await.unwrap_err();
    let InstallError::Failures(failures) = err else {
        panic!("expected failures, got {:?}", err);
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].to, "mods/Test Mod/foo.ini");
    assert!(
        matches!(failures[0].error, DirectiveError::Patch(_) | DirectiveError::HashMismatch { .. }),
        "got {:?}",
        failures[0].error
    );
    assert!(!env.installed("mods/Test Mod/foo.ini").exists());
    env.verify_installed_file("Test Mod", "a.pex");
}
