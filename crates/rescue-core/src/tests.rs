use std::path::{Path, PathBuf};

use super::*;

#[test]
fn control_block_layout_matches_firmware_sizes() {
    assert_eq!(CONTROL_BLOCK_SIZE, 1088);

    let mut block = ControlBlock::default();
    block.command.set("boot-recovery");
    block.status.set("OKAY");
    block.recovery.set("recovery\n--wipe_data\n");

    let raw = block.to_bytes();
    assert_eq!(&raw[..13], b"boot-recovery");
    assert_eq!(&raw[32..36], b"OKAY");
    assert_eq!(&raw[64..73], b"recovery\n");
    assert_eq!(ControlBlock::from_bytes(&raw), block);
}

#[test]
fn erased_and_zeroed_fields_are_empty() {
    let zeroed = FixedField::<8>::default();
    assert!(zeroed.is_empty());
    assert_eq!(zeroed.as_text(), "");

    let erased = FixedField::<8>::from_bytes([0xFF; 8]);
    assert!(erased.is_empty());
    assert_eq!(erased.as_text(), "");

    let erased_block = ControlBlock::from_bytes(&[0xFF; CONTROL_BLOCK_SIZE]);
    assert!(erased_block.command.is_empty());
    assert!(erased_block.recovery.is_empty());
    assert!(erased_block.recovery_tokens().is_empty());
    assert!(!erased_block.is_zeroed());
}

#[test]
fn fixed_field_set_truncates_and_keeps_terminator() {
    let field = FixedField::<8>::from_text("abcdefghijkl");
    assert_eq!(field.as_text(), "abcdefg");
    assert_eq!(field.as_bytes()[7], 0);

    let mut reused = FixedField::<8>::from_text("abcdefg");
    reused.set("xy");
    assert_eq!(reused.as_bytes(), b"xy\0\0\0\0\0\0");
}

#[test]
fn fixed_field_without_terminator_stops_before_last_byte() {
    let field = FixedField::<4>::from_bytes(*b"abcd");
    assert_eq!(field.as_text(), "abc");
}

#[test]
fn checkpoint_encodes_marker_and_args_and_keeps_status() {
    let mut block = ControlBlock::default();
    block.status.set("firmware-ok");
    block.checkpoint(&["--update_package=CACHE:update.zip", "--send_intent=done"]);

    assert_eq!(block.command.as_text(), BOOT_RECOVERY_COMMAND);
    assert_eq!(block.status.as_text(), "firmware-ok");
    assert_eq!(
        block.recovery.as_text(),
        "recovery\n--update_package=CACHE:update.zip\n--send_intent=done\n"
    );
    assert_eq!(
        block.recovery_tokens(),
        vec![
            "recovery",
            "--update_package=CACHE:update.zip",
            "--send_intent=done"
        ]
    );
}

#[test]
fn checkpoint_with_no_args_still_points_at_recovery() {
    let mut block = ControlBlock::default();
    block.checkpoint::<&str>(&[]);
    assert_eq!(block.command.as_text(), "boot-recovery");
    assert_eq!(block.recovery_tokens(), vec![RECOVERY_MARKER]);
}

#[test]
fn checkpoint_keeps_whole_arguments_only() {
    let intent = format!("--send_intent={}", "x".repeat(990));
    let mut block = ControlBlock::default();
    let stored = block.checkpoint(&[
        intent.as_str(),
        "--update_package=CACHE:recovery/update.zip",
        "--wipe_cache",
    ]);

    assert_eq!(stored, 1);
    assert_eq!(block.recovery_tokens(), vec![RECOVERY_MARKER, intent.as_str()]);
    assert!(block.recovery.as_text().ends_with('\n'));
}

#[test]
fn checkpoint_drops_argument_longer_than_field() {
    let long = "x".repeat(2000);
    let mut block = ControlBlock::default();
    assert_eq!(block.checkpoint(&[long.as_str()]), 0);
    assert_eq!(block.recovery_tokens(), vec![RECOVERY_MARKER]);
    assert_eq!(block.recovery.as_bytes()[RECOVERY_FIELD_LEN - 1], 0);
}

#[test]
fn checkpoint_fills_field_exactly() {
    // marker line (9 bytes) + 1013 + newline = 1023 usable bytes
    let fitting = "y".repeat(RECOVERY_FIELD_LEN - 1 - 10);
    let mut block = ControlBlock::default();
    assert_eq!(block.checkpoint(&[fitting.as_str()]), 1);
    assert_eq!(block.recovery.as_text().len(), RECOVERY_FIELD_LEN - 1);
    assert_eq!(block.recovery_tokens()[1], fitting);
}

#[test]
fn recovery_tokens_skip_blank_lines() {
    let block = ControlBlock {
        recovery: FixedField::from_text("recovery\n\n--wipe_cache\n"),
        ..ControlBlock::default()
    };
    assert_eq!(block.recovery_tokens(), vec!["recovery", "--wipe_cache"]);
}

#[test]
fn volume_path_parses_volume_and_relative_path() {
    let path = VolumePath::parse("CACHE:recovery/command").expect("must parse");
    assert_eq!(path.volume(), "CACHE");
    assert_eq!(path.relative_path(), Path::new("recovery/command"));
    assert_eq!(path.to_string(), "CACHE:recovery/command");
    assert_eq!(
        path.under(Path::new("/cache")),
        PathBuf::from("/cache/recovery/command")
    );

    let root = VolumePath::parse("SDCARD:").expect("volume root must parse");
    assert_eq!(root.under(Path::new("/sdcard")), PathBuf::from("/sdcard"));
}

#[test]
fn volume_path_rejects_escapes_and_bad_names() {
    for raw in [
        "CACHE:../etc/passwd",
        "CACHE:/abs/path",
        "cache:recovery/command",
        ":recovery/command",
        "no-separator",
    ] {
        let err = VolumePath::parse(raw).expect_err("must reject");
        assert!(
            matches!(err, RecoveryError::InvalidVolumePath { .. }),
            "unexpected error for {raw}: {err}"
        );
    }
}

#[test]
fn flags_parse_inline_and_separate_values() {
    let parsed = parse_recovery_flags(&[
        "recovery",
        "--update_package=CACHE:update.zip",
        "--send_intent",
        "hello world",
        "--previous_runs=2",
    ]);
    assert!(parsed.rejected.is_empty());
    assert!(parsed.parse_error.is_none());
    assert_eq!(
        parsed.flags.update_package.as_deref(),
        Some("CACHE:update.zip")
    );
    assert_eq!(parsed.flags.send_intent.as_deref(), Some("hello world"));
    assert_eq!(parsed.flags.previous_runs, Some(2));
    assert_eq!(
        parsed.flags.operation(),
        RequestedOperation::InstallPackage("CACHE:update.zip".to_string())
    );
}

#[test]
fn flags_set_aside_unknown_tokens() {
    let parsed = parse_recovery_flags(&["recovery", "--bogus", "stray", "--wipe_cache"]);
    assert_eq!(parsed.rejected, vec!["--bogus", "stray"]);
    assert!(parsed.parse_error.is_none());
    assert!(parsed.flags.wipe_cache);
    assert_eq!(
        parsed.flags.operation(),
        RequestedOperation::Wipe {
            data: false,
            cache: true
        }
    );
}

#[test]
fn wipe_data_implies_wipe_cache() {
    let parsed = parse_recovery_flags(&["recovery", "--wipe_data"]);
    assert_eq!(
        parsed.flags.operation(),
        RequestedOperation::Wipe {
            data: true,
            cache: true
        }
    );
}

#[test]
fn install_takes_precedence_over_wipes() {
    let parsed = parse_recovery_flags(&[
        "recovery",
        "--wipe_data",
        "--update_package=SDCARD:update.zip",
    ]);
    assert_eq!(
        parsed.flags.operation(),
        RequestedOperation::InstallPackage("SDCARD:update.zip".to_string())
    );
}

#[test]
fn repeated_flag_keeps_last_value() {
    let parsed = parse_recovery_flags(&["recovery", "--send_intent=a", "--send_intent=b"]);
    assert!(parsed.parse_error.is_none());
    assert_eq!(parsed.flags.send_intent.as_deref(), Some("b"));
}

#[test]
fn malformed_flag_value_degrades_to_no_operation() {
    let parsed = parse_recovery_flags(&["recovery", "--wipe_data", "--previous_runs=many"]);
    assert!(parsed.parse_error.is_some());
    assert_eq!(parsed.flags.operation(), RequestedOperation::Nothing);
}

#[test]
fn empty_command_requests_nothing() {
    let parsed = parse_recovery_flags::<&str>(&[]);
    assert_eq!(parsed.flags.operation(), RequestedOperation::Nothing);
    let only_program = parse_recovery_flags(&["recovery"]);
    assert_eq!(only_program.flags.operation(), RequestedOperation::Nothing);
}

#[test]
fn config_defaults_match_recovery_layout() {
    let config = RecoveryConfig::default();
    assert_eq!(config.locations.command_file, "CACHE:recovery/command");
    assert_eq!(config.locations.intent_file, "CACHE:recovery/intent");
    assert_eq!(config.locations.log_file, "CACHE:recovery/log");
    assert_eq!(config.limits.max_args, 100);
    assert_eq!(config.limits.max_arg_length, 4096);
    assert!(config.volume("DATA").is_some());
    assert!(config.volume("CACHE").is_some());
}

#[test]
fn config_parses_partial_toml_with_defaults() {
    let config = RecoveryConfig::from_toml_str(
        r#"
[control_block]
path = "/tmp/misc.img"
offset = 2048

[limits]
max_args = 8

[[volumes]]
name = "CACHE"
mount_point = "/tmp/cache"
format_command = ["mkfs.ext4", "-F", "{device}"]
device = "/dev/loop0"
"#,
    )
    .expect("config must parse");

    assert_eq!(config.control_block.path, PathBuf::from("/tmp/misc.img"));
    assert_eq!(config.control_block.offset, 2048);
    assert_eq!(config.limits.max_args, 8);
    assert_eq!(config.limits.max_arg_length, 4096);
    assert_eq!(config.volumes.len(), 1);
    let cache = config.volume("CACHE").expect("cache volume");
    assert_eq!(cache.device.as_deref(), Some("/dev/loop0"));
    assert_eq!(
        cache.format_command.as_deref(),
        Some(&["mkfs.ext4".to_string(), "-F".to_string(), "{device}".to_string()][..])
    );
}

#[test]
fn config_rejects_duplicate_volumes_and_bad_locations() {
    let duplicate = RecoveryConfig::from_toml_str(
        r#"
[[volumes]]
name = "DATA"
mount_point = "/data"

[[volumes]]
name = "DATA"
mount_point = "/data2"
"#,
    );
    assert!(duplicate.is_err());

    let bad_location = RecoveryConfig::from_toml_str(
        r#"
[locations]
command_file = "/cache/recovery/command"
"#,
    );
    assert!(bad_location.is_err());
}

#[test]
fn missing_config_file_loads_defaults() {
    let path = std::env::temp_dir().join(format!(
        "rescue-core-tests-missing-{}.toml",
        std::process::id()
    ));
    let config = RecoveryConfig::load(&path).expect("missing config must not fail");
    assert_eq!(config, RecoveryConfig::default());
}

#[test]
fn unreadable_config_falls_back_with_error() {
    let path = std::env::temp_dir().join(format!(
        "rescue-core-tests-broken-{}.toml",
        std::process::id()
    ));
    std::fs::write(&path, "limits = [").expect("must write broken config");

    let (config, err) = RecoveryConfig::load_or_default(&path);
    assert_eq!(config, RecoveryConfig::default());
    assert!(err.is_some());

    let _ = std::fs::remove_file(&path);
}
