use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{bail, Result};
use rescue_core::{ArgLimits, ControlBlock, Locations, VolumeConfig};
use rescue_installer::{CommandRunner, ConfiguredVolumes, InstallStatus, PackageInstaller};
use rescue_session::{Console, ControlBlockStore, MenuKey, SessionPaths};

use crate::logging::LogFormat;
use crate::platform::Platform;
use crate::render::{parse_key, render_menu_lines, OutputStyle};
use crate::session::{RecoverySession, SessionContext, SessionEnd};

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_root() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let sequence = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "rescue-cli-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ))
}

#[derive(Default)]
struct MemoryStore {
    block: ControlBlock,
}

impl ControlBlockStore for MemoryStore {
    fn read(&mut self) -> ControlBlock {
        self.block
    }

    fn write(&mut self, block: &ControlBlock) -> bool {
        self.block = *block;
        true
    }
}

struct QueuedInstaller {
    statuses: VecDeque<InstallStatus>,
    installed: Vec<PathBuf>,
}

impl PackageInstaller for QueuedInstaller {
    fn install(&mut self, package: &Path, _on_tick: &mut dyn FnMut()) -> InstallStatus {
        self.installed.push(package.to_path_buf());
        self.statuses.pop_front().unwrap_or(InstallStatus::Error)
    }
}

#[derive(Default)]
struct ScriptedConsole {
    keys: VecDeque<MenuKey>,
    lines: Vec<String>,
    menus: Vec<usize>,
    errors: usize,
}

impl Console for ScriptedConsole {
    fn print(&mut self, message: &str) {
        self.lines.push(message.to_string());
    }

    fn show_error(&mut self) {
        self.errors += 1;
    }

    fn show_menu(&mut self, _headers: &[&str], _items: &[&str], selected: usize) {
        self.menus.push(selected);
    }

    fn start_progress(&mut self, _label: &str) {}

    fn tick_progress(&mut self) {}

    fn end_progress(&mut self) {}

    fn read_key(&mut self) -> Option<MenuKey> {
        self.keys.pop_front()
    }
}

#[derive(Default)]
struct FakePlatform {
    reboots: usize,
    fail: bool,
}

impl Platform for FakePlatform {
    fn reboot(&mut self) -> Result<()> {
        self.reboots += 1;
        if self.fail {
            bail!("reboot refused");
        }
        Ok(())
    }
}

struct Harness {
    root: PathBuf,
    store: MemoryStore,
    volumes: ConfiguredVolumes,
    installer: QueuedInstaller,
    console: ScriptedConsole,
    platform: FakePlatform,
    paths: SessionPaths,
}

impl Harness {
    fn new() -> Self {
        let root = test_root();
        fs::create_dir_all(&root).expect("must create test root");
        let configs = ["DATA", "CACHE", "SDCARD"]
            .into_iter()
            .map(|name| VolumeConfig {
                name: name.to_string(),
                mount_point: root.join(name.to_ascii_lowercase()),
                device: None,
                mount_command: None,
                unmount_command: None,
                format_command: None,
            })
            .collect::<Vec<_>>();
        let locations = Locations {
            temporary_log: root.join("recovery.log"),
            ..Locations::default()
        };

        Self {
            volumes: ConfiguredVolumes::new(&configs, CommandRunner::new(Duration::from_millis(5))),
            paths: SessionPaths::from_locations(&locations).expect("default locations parse"),
            root,
            store: MemoryStore::default(),
            installer: QueuedInstaller {
                statuses: VecDeque::new(),
                installed: Vec::new(),
            },
            console: ScriptedConsole::default(),
            platform: FakePlatform::default(),
        }
    }

    fn with_installs(mut self, statuses: &[InstallStatus]) -> Self {
        self.installer.statuses = statuses.iter().copied().collect();
        self
    }

    fn with_keys(mut self, keys: &[MenuKey]) -> Self {
        self.console.keys = keys.iter().copied().collect();
        self
    }

    fn run(&mut self, args: &[&str]) -> SessionEnd {
        let args = args.iter().map(|arg| arg.to_string()).collect::<Vec<_>>();
        RecoverySession::new(SessionContext {
            store: &mut self.store,
            volumes: &mut self.volumes,
            installer: &mut self.installer,
            console: &mut self.console,
            platform: &mut self.platform,
            paths: &self.paths,
            limits: ArgLimits::default(),
        })
        .run(&args)
    }

    fn cache_file(&self, relative: &str) -> PathBuf {
        self.root.join("cache").join(relative)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

#[test]
fn successful_session_finishes_then_reboots() {
    let mut harness = Harness::new();
    fs::create_dir_all(harness.cache_file("recovery")).expect("must create cache");
    fs::write(harness.cache_file("recovery/command"), "--wipe_cache\n--send_intent=done\n")
        .expect("must write command file");

    let end = harness.run(&["/sbin/recovery"]);

    assert_eq!(end, SessionEnd::Rebooted);
    assert_eq!(harness.platform.reboots, 1);
    assert!(harness.store.block.is_zeroed());
    assert_eq!(
        fs::read_to_string(harness.cache_file("recovery/intent")).expect("intent"),
        "done"
    );
    assert!(harness.console.menus.is_empty());
}

#[test]
fn failure_without_operator_keeps_checkpoint() {
    let mut harness = Harness::new().with_installs(&[InstallStatus::Error]);

    let end = harness.run(&["/sbin/recovery", "--update_package=CACHE:update.zip"]);

    assert_eq!(end, SessionEnd::Halted);
    assert_eq!(harness.platform.reboots, 0);
    assert_eq!(harness.store.block.command.as_text(), "boot-recovery");
    assert_eq!(
        harness.store.block.recovery_tokens(),
        vec!["recovery", "--update_package=CACHE:update.zip"]
    );
    assert_eq!(harness.console.menus.len(), 1);
}

#[test]
fn operator_reboot_from_menu_completes_session() {
    let mut harness = Harness::new()
        .with_installs(&[InstallStatus::Error])
        .with_keys(&[MenuKey::Item(0)]);

    let end = harness.run(&[
        "/sbin/recovery",
        "--update_package=CACHE:update.zip",
        "--send_intent=after-failure",
    ]);

    assert_eq!(end, SessionEnd::Rebooted);
    assert!(harness.store.block.is_zeroed());
    assert_eq!(harness.console.errors, 1);
    assert_eq!(
        fs::read_to_string(harness.cache_file("recovery/intent")).expect("intent"),
        "after-failure"
    );
}

#[test]
fn retried_operation_from_menu_finishes_session() {
    let mut harness = Harness::new()
        .with_installs(&[InstallStatus::Error, InstallStatus::Error, InstallStatus::Success])
        .with_keys(&[MenuKey::Item(1), MenuKey::Down, MenuKey::Up, MenuKey::Select]);

    let end = harness.run(&["/sbin/recovery", "--update_package=CACHE:update.zip"]);

    assert_eq!(end, SessionEnd::Rebooted);
    assert_eq!(
        harness.installer.installed,
        vec![
            harness.cache_file("update.zip"),
            harness.root.join("sdcard").join("update.zip"),
            harness.root.join("sdcard").join("update.zip"),
        ]
    );
    // One failed session, one failed retry.
    assert_eq!(harness.console.errors, 2);
    assert_eq!(harness.console.menus, vec![0, 1, 2, 1]);
    assert!(harness.store.block.is_zeroed());
}

#[test]
fn wipe_from_menu_counts_as_completion() {
    let mut harness = Harness::new().with_keys(&[MenuKey::Item(3)]);
    fs::create_dir_all(harness.root.join("cache")).expect("must create cache");
    fs::write(harness.cache_file("junk"), "x").expect("must seed cache");

    let end = harness.run(&["/sbin/recovery", "--unknown"]);

    assert_eq!(end, SessionEnd::Rebooted);
    assert!(!harness.cache_file("junk").exists());
    assert!(harness
        .console
        .lines
        .iter()
        .any(|line| line == "No command specified."));
}

#[test]
fn shell_exit_finishes_without_reboot() {
    let mut harness = Harness::new().with_keys(&[MenuKey::Up, MenuKey::Select]);

    let end = harness.run(&["/sbin/recovery"]);

    assert_eq!(end, SessionEnd::Shell);
    assert_eq!(harness.platform.reboots, 0);
    assert!(harness.store.block.is_zeroed());
}

#[test]
fn out_of_range_menu_pick_is_ignored() {
    let mut harness = Harness::new().with_keys(&[MenuKey::Item(9), MenuKey::Item(0)]);

    let end = harness.run(&["/sbin/recovery"]);

    assert_eq!(end, SessionEnd::Rebooted);
    assert_eq!(harness.console.menus.len(), 2);
}

#[test]
fn failed_reboot_halts_after_finishing() {
    let mut harness = Harness::new();
    harness.platform.fail = true;

    let end = harness.run(&["/sbin/recovery", "--wipe_cache"]);

    assert_eq!(end, SessionEnd::Halted);
    assert_eq!(harness.platform.reboots, 1);
    assert!(harness.store.block.is_zeroed());
}

#[test]
fn parse_key_maps_operator_input() {
    assert_eq!(parse_key("\n"), Some(MenuKey::Select));
    assert_eq!(parse_key("w\n"), Some(MenuKey::Up));
    assert_eq!(parse_key("K"), Some(MenuKey::Up));
    assert_eq!(parse_key("down"), Some(MenuKey::Down));
    assert_eq!(parse_key(" 3 "), Some(MenuKey::Item(2)));
    assert_eq!(parse_key("0"), None);
    assert_eq!(parse_key("reboot"), None);
}

#[test]
fn plain_menu_marks_selected_item() {
    let lines = render_menu_lines(
        OutputStyle::Plain,
        &["System recovery"],
        &["reboot system now", "exit to shell"],
        1,
    );

    assert_eq!(
        lines,
        vec![
            "System recovery".to_string(),
            "  1. reboot system now".to_string(),
            "> 2. exit to shell".to_string(),
        ]
    );
}

#[test]
fn log_format_parse_accepts_known_values() {
    assert_eq!(LogFormat::parse("json").expect("json"), LogFormat::Json);
    assert_eq!(LogFormat::parse(" Human ").expect("human"), LogFormat::Human);
    let err = LogFormat::parse("xml").expect_err("xml must be rejected");
    assert!(err.to_string().contains("RESCUE_LOG_FORMAT"));
}
