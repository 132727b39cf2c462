/// Operator input, as far as the recovery menu cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKey {
    Up,
    Down,
    Select,
    /// Direct pick of a zero-based menu item.
    Item(usize),
}

/// Display and input capability of the recovery environment.
pub trait Console {
    fn print(&mut self, message: &str);

    /// Switches the screen to its failure indication.
    fn show_error(&mut self);

    fn show_menu(&mut self, headers: &[&str], items: &[&str], selected: usize);

    fn start_progress(&mut self, label: &str);

    fn tick_progress(&mut self);

    fn end_progress(&mut self);

    /// Blocks for the next key. `None` means input is gone for good.
    fn read_key(&mut self) -> Option<MenuKey>;
}
