// End-to-end installs against local archives and throwaway kiln roots.
#![cfg(unix)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use kiln_common::error::{BuildPhase, KilnError};
use kiln_common::model::SourceSelection;
use kiln_common::{Config, Recipe};
use kiln_core::receipt::ReceiptSource;
use kiln_core::{install, InstallOptions, InstallPlan, InstallReceipt};
use tempfile::TempDir;

const RECIPE: &str = r#"
[package]
name = "demo"
version = "1.0"
url = "@PRIMARY_URL@"
sha256 = "@PRIMARY_SHA@"
@HEAD@

[[dependency]]
name = "sh"
kind = "build"

[[env]]
name = "PYTHONPATH"
value = "{libexec}/lib"

@RESOURCES@

[build]
system = "custom"
source_subdir = "host"
args = ["--extra-one", "--extra-two"]
@BUILD@
"#;

const RECORDING_BUILD: &str = r#"
configure = ['sh', '-c', 'echo "$PYTHONPATH" > configured.txt; echo "$@" > args.txt', 'configure']
install = ['sh', '-c', 'mkdir -p {prefix}/bin && cp configured.txt args.txt {prefix}/ && cp {source_dir}/tool {prefix}/bin/']
"#;

struct Fixture {
    root: TempDir,
    config: Config,
    primary_url: String,
    primary_sha: String,
    resource_url: String,
    resource_sha: String,
}

fn write_tar_gz(path: &Path, files: &[(&str, &[u8])]) {
    let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let sources = root.path().join("sources");
        fs::create_dir_all(&sources).unwrap();

        let primary = sources.join("demo-1.0.tar.gz");
        write_tar_gz(
            &primary,
            &[
                ("demo-1.0/README", b"demo\n"),
                ("demo-1.0/host/tool", b"#!/bin/sh\necho demo\n"),
            ],
        );
        let resource = sources.join("pyusb-1.0.0b1.tar.gz");
        write_tar_gz(&resource, &[("pyusb-1.0.0b1/usb.py", b"# usb\n")]);

        let mut config = Config::with_root(root.path().join("kiln"));
        config.make_jobs = 2;
        Self {
            primary_url: primary.to_string_lossy().to_string(),
            primary_sha: kiln_net::sha256_file(&primary).unwrap(),
            resource_url: format!("file://{}", resource.display()),
            resource_sha: kiln_net::sha256_file(&resource).unwrap(),
            root,
            config,
        }
    }

    fn marker(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    fn resource_block(&self, name: &str, sha: &str, stage: &str) -> String {
        format!(
            "[[resource]]\nname = \"{name}\"\nurl = \"{}\"\nsha256 = \"{sha}\"\nstage = {stage}\n",
            self.resource_url
        )
    }

    fn copying_resource(&self, name: &str) -> String {
        self.resource_block(
            name,
            &self.resource_sha,
            "[['sh', '-c', 'mkdir -p {prefix}/runtime/lib && cp usb.py {prefix}/runtime/lib/']]",
        )
    }

    fn recipe(&self, resources: &str, build: &str) -> Recipe {
        self.recipe_with_head(resources, build, "")
    }

    fn recipe_with_head(&self, resources: &str, build: &str, head: &str) -> Recipe {
        RECIPE
            .replace("@PRIMARY_URL@", &self.primary_url)
            .replace("@PRIMARY_SHA@", &self.primary_sha)
            .replace("@HEAD@", head)
            .replace("@RESOURCES@", resources)
            .replace("@BUILD@", build)
            .parse()
            .unwrap()
    }

    fn prefix(&self) -> PathBuf {
        self.config.package_prefix("demo", "1.0")
    }

    fn prefix_is_empty(&self) -> bool {
        let prefix = self.prefix();
        !prefix.exists() || fs::read_dir(prefix).unwrap().next().is_none()
    }
}

fn options() -> InstallOptions {
    InstallOptions {
        clean_env: true,
        ..InstallOptions::default()
    }
}

fn touch(path: &Path) -> String {
    format!("['touch', '{}']", path.display())
}

#[tokio::test]
async fn installs_primary_and_resources_into_prefix() {
    let fx = Fixture::new();
    let recipe = fx.recipe(&fx.copying_resource("pyusb"), RECORDING_BUILD);

    let prefix = install(InstallPlan::from(&recipe), &fx.config, options())
        .await
        .unwrap();
    assert_eq!(prefix, fx.prefix());

    assert!(prefix.join("runtime/lib/usb.py").is_file());
    assert!(prefix.join("bin/tool").is_file());

    // The build saw the overlay and got standard args before the extras.
    let seen_path = fs::read_to_string(prefix.join("configured.txt")).unwrap();
    assert_eq!(seen_path.trim(), format!("{}/libexec/lib", prefix.display()));
    let args = fs::read_to_string(prefix.join("args.txt")).unwrap();
    assert_eq!(
        args.trim(),
        format!("--prefix={} --extra-one --extra-two", prefix.display())
    );

    let receipt = InstallReceipt::read(&prefix).unwrap();
    assert_eq!(receipt.name, "demo");
    assert_eq!(receipt.version, "1.0");
    assert_eq!(receipt.build_system, "custom");
    assert_eq!(receipt.resources.len(), 1);
    assert!(matches!(receipt.source, ReceiptSource::Archive { .. }));

    assert!(fx
        .config
        .package_logs_dir("demo", "1.0")
        .join("01.sh.log")
        .is_file());
    assert_eq!(fs::read_dir(fx.config.tmp_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn resource_hash_mismatch_installs_nothing() {
    let fx = Fixture::new();
    let ran = fx.marker("staged");
    let resources = fx.resource_block("pyusb", &"0".repeat(64), &format!("[{}]", touch(&ran)));
    let recipe = fx.recipe(&resources, RECORDING_BUILD);

    let err = install(InstallPlan::from(&recipe), &fx.config, options())
        .await
        .unwrap_err();
    assert!(matches!(err, KilnError::Integrity { ref name, .. } if name == "pyusb"));
    assert!(!ran.exists());
    assert!(fx.prefix_is_empty());
}

#[tokio::test]
async fn later_resource_mismatch_stages_no_earlier_resource() {
    let fx = Fixture::new();
    let resources = format!(
        "{}\n{}",
        fx.copying_resource("first"),
        fx.resource_block("second", &"0".repeat(64), "[['true']]"),
    );
    let recipe = fx.recipe(&resources, RECORDING_BUILD);

    let err = install(InstallPlan::from(&recipe), &fx.config, options())
        .await
        .unwrap_err();
    assert!(matches!(err, KilnError::Integrity { ref name, .. } if name == "second"));
    assert!(!fx.prefix().join("runtime/lib/usb.py").exists());
    assert!(fx.prefix_is_empty());
}

#[tokio::test]
async fn primary_hash_mismatch_stages_no_resources() {
    let mut fx = Fixture::new();
    fx.primary_sha = "f".repeat(64);
    let ran = fx.marker("staged");
    let resources = fx.resource_block("pyusb", &fx.resource_sha, &format!("[{}]", touch(&ran)));
    let recipe = fx.recipe(&resources, RECORDING_BUILD);

    let err = install(InstallPlan::from(&recipe), &fx.config, options())
        .await
        .unwrap_err();
    assert!(matches!(err, KilnError::Integrity { ref name, .. } if name == "demo"));
    assert!(!ran.exists());
    assert!(fx.prefix_is_empty());
}

#[tokio::test]
async fn configure_failure_never_runs_build_and_install() {
    let fx = Fixture::new();
    let built = fx.marker("built");
    let build = format!("configure = ['sh', '-c', 'exit 4']\ninstall = {}\n", touch(&built));
    let recipe = fx.recipe("", &build);

    let err = install(InstallPlan::from(&recipe), &fx.config, options())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        KilnError::Build {
            phase: BuildPhase::Configure,
            exit_code: Some(4)
        }
    ));
    assert!(!built.exists());
}

#[tokio::test]
async fn failing_resource_stops_later_resources_and_build() {
    let fx = Fixture::new();
    let second = fx.marker("second");
    let built = fx.marker("built");
    let resources = format!(
        "{}\n{}",
        fx.resource_block("first", &fx.resource_sha, "[['sh', '-c', 'exit 5']]"),
        fx.resource_block("second", &fx.resource_sha, &format!("[{}]", touch(&second))),
    );
    let build = format!("configure = ['true']\ninstall = {}\n", touch(&built));
    let recipe = fx.recipe(&resources, &build);

    let err = install(InstallPlan::from(&recipe), &fx.config, options())
        .await
        .unwrap_err();
    match err {
        KilnError::ResourceInstall {
            resource,
            exit_code,
        } => {
            assert_eq!(resource, "first");
            assert_eq!(exit_code, Some(5));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!second.exists());
    assert!(!built.exists());
}

#[tokio::test]
async fn reinstall_requires_force() {
    let fx = Fixture::new();
    let recipe = fx.recipe(&fx.copying_resource("pyusb"), RECORDING_BUILD);
    let plan = InstallPlan::from(&recipe);

    install(plan, &fx.config, options()).await.unwrap();
    let err = install(plan, &fx.config, options()).await.unwrap_err();
    assert!(matches!(err, KilnError::InstallError(_)));

    let forced = InstallOptions {
        force: true,
        ..options()
    };
    let prefix = install(plan, &fx.config, forced).await.unwrap();
    assert!(prefix.join("bin/tool").is_file());
}

#[tokio::test]
async fn concurrent_versions_keep_separate_logs() {
    let fx = Fixture::new();
    let one = fx.recipe(&fx.copying_resource("pyusb"), RECORDING_BUILD);
    let mut two = one.clone();
    two.package.version = "2.0".into();

    let (a, b) = tokio::join!(
        install(InstallPlan::from(&one), &fx.config, options()),
        install(InstallPlan::from(&two), &fx.config, options()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a, b);
    assert!(a.join("bin/tool").is_file());
    assert!(b.join("runtime/lib/usb.py").is_file());

    for version in ["1.0", "2.0"] {
        let logs = fx.config.package_logs_dir("demo", version);
        // One resource step, then configure and build+install.
        assert_eq!(fs::read_dir(&logs).unwrap().count(), 3, "logs of {version}");
    }
}

#[tokio::test]
async fn keep_build_dir_leaves_sources_behind() {
    let fx = Fixture::new();
    let recipe = fx.recipe("", RECORDING_BUILD);
    let keep = InstallOptions {
        keep_build_dir: true,
        ..options()
    };
    install(InstallPlan::from(&recipe), &fx.config, keep)
        .await
        .unwrap();

    let kept: Vec<_> = fs::read_dir(fx.config.tmp_dir())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(kept.len(), 1);
    assert!(kept[0].join("src/demo-1.0/host/build/args.txt").is_file());
}

#[tokio::test]
async fn head_install_uses_checkout_and_head_version() {
    use git2::{Repository, Signature};

    let fx = Fixture::new();
    let upstream = fx.root.path().join("upstream");
    fs::create_dir_all(upstream.join("host")).unwrap();
    fs::write(upstream.join("host/tool"), "#!/bin/sh\necho head\n").unwrap();
    let repo = Repository::init(&upstream).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new("host/tool")).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("kiln", "kiln@example.org").unwrap();
    let commit = repo
        .commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
        .unwrap();

    let head = format!("head = {{ url = \"{}\" }}", upstream.display());
    let recipe = fx.recipe_with_head("", RECORDING_BUILD, &head);
    let options = InstallOptions {
        source: SourceSelection::Head,
        ..options()
    };
    let prefix = install(InstallPlan::from(&recipe), &fx.config, options)
        .await
        .unwrap();

    assert_eq!(prefix, fx.config.package_prefix("demo", "HEAD"));
    assert_eq!(
        fs::read_to_string(prefix.join("bin/tool")).unwrap(),
        "#!/bin/sh\necho head\n"
    );
    match InstallReceipt::read(&prefix).unwrap().source {
        ReceiptSource::Head { commit: recorded, .. } => assert_eq!(recorded, commit.to_string()),
        other => panic!("unexpected source: {other:?}"),
    }
}
