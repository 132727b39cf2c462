//! Operator menu shown after a failed session.
//!
//! Nothing here reboots on its own. The menu is left only when the operator
//! asks to reboot or drop to a shell, when a retried operation succeeds, or
//! when input is gone for good.

use rescue_core::VolumePath;
use rescue_installer::{PackageInstaller, VolumeManager};
use rescue_session::{Console, MenuKey, OperationOrchestrator, SessionOutcome};
use tracing::{info, warn};

const HEADERS: [&str; 3] = [
    "System recovery",
    "Use up/down to highlight, select to run, or type an item number.",
    "",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FallbackExit {
    Reboot,
    /// A retried operation succeeded.
    Completed,
    Shell,
    InputClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    Reboot,
    ApplyDefaultPackage,
    WipeData,
    WipeCache,
    Shell,
}

const MENU: [MenuItem; 5] = [
    MenuItem::Reboot,
    MenuItem::ApplyDefaultPackage,
    MenuItem::WipeData,
    MenuItem::WipeCache,
    MenuItem::Shell,
];

fn menu_label(item: MenuItem, default_package: &VolumePath) -> String {
    match item {
        MenuItem::Reboot => "reboot system now".to_string(),
        MenuItem::ApplyDefaultPackage => format!("apply update from {default_package}"),
        MenuItem::WipeData => "wipe data/factory reset".to_string(),
        MenuItem::WipeCache => "wipe cache partition".to_string(),
        MenuItem::Shell => "exit to shell".to_string(),
    }
}

pub(crate) fn prompt_and_wait(
    volumes: &mut dyn VolumeManager,
    installer: &mut dyn PackageInstaller,
    console: &mut dyn Console,
    default_package: &VolumePath,
) -> FallbackExit {
    let labels = MENU
        .iter()
        .map(|item| menu_label(*item, default_package))
        .collect::<Vec<_>>();
    let labels = labels.iter().map(String::as_str).collect::<Vec<_>>();
    let mut selected = 0_usize;

    loop {
        console.show_menu(&HEADERS, &labels, selected);
        let chosen = match console.read_key() {
            None => {
                warn!("operator input closed");
                return FallbackExit::InputClosed;
            }
            Some(MenuKey::Up) => {
                selected = selected.checked_sub(1).unwrap_or(MENU.len() - 1);
                continue;
            }
            Some(MenuKey::Down) => {
                selected = (selected + 1) % MENU.len();
                continue;
            }
            Some(MenuKey::Select) => selected,
            Some(MenuKey::Item(index)) if index < MENU.len() => {
                selected = index;
                index
            }
            Some(MenuKey::Item(index)) => {
                warn!(index, "no such menu item");
                continue;
            }
        };

        let item = MENU[chosen];
        info!(item = ?item, "menu selection");
        let outcome = match item {
            MenuItem::Reboot => return FallbackExit::Reboot,
            MenuItem::Shell => return FallbackExit::Shell,
            MenuItem::ApplyDefaultPackage => OperationOrchestrator::new(volumes, installer, console)
                .install_package(&default_package.to_string()),
            MenuItem::WipeData => {
                OperationOrchestrator::new(volumes, installer, console).wipe(true, true)
            }
            MenuItem::WipeCache => {
                OperationOrchestrator::new(volumes, installer, console).wipe(false, true)
            }
        };

        if outcome == SessionOutcome::Success {
            return FallbackExit::Completed;
        }
        console.show_error();
    }
}
