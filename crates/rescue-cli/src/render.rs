use std::io::{BufRead, IsTerminal};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use rescue_session::{Console, MenuKey};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

impl OutputStyle {
    pub(crate) fn current() -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
        if !no_color && std::io::stdout().is_terminal() {
            Self::Rich
        } else {
            Self::Plain
        }
    }
}

/// Console on the process's own terminal, with line-based key input.
pub(crate) struct TerminalConsole<R> {
    style: OutputStyle,
    input: R,
    progress: Option<ProgressBar>,
}

impl<R: BufRead> TerminalConsole<R> {
    pub(crate) fn new(style: OutputStyle, input: R) -> Self {
        Self {
            style,
            input,
            progress: None,
        }
    }
}

impl<R: BufRead> Console for TerminalConsole<R> {
    fn print(&mut self, message: &str) {
        match &self.progress {
            Some(progress_bar) => progress_bar.println(message),
            None => println!("{message}"),
        }
    }

    fn show_error(&mut self) {
        let line = match self.style {
            OutputStyle::Plain => "[error]".to_string(),
            OutputStyle::Rich => colorize(error_style(), "!! recovery needs attention !!"),
        };
        println!("{line}");
    }

    fn show_menu(&mut self, headers: &[&str], items: &[&str], selected: usize) {
        println!();
        for line in render_menu_lines(self.style, headers, items, selected) {
            println!("{line}");
        }
    }

    fn start_progress(&mut self, label: &str) {
        if self.style != OutputStyle::Rich {
            return;
        }
        let progress_bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg:<8} {elapsed}") {
            progress_bar.set_style(style.tick_chars(progress_tick_chars(label)));
        }
        progress_bar.set_message(label.to_string());
        self.progress = Some(progress_bar);
    }

    fn tick_progress(&mut self) {
        if let Some(progress_bar) = &self.progress {
            progress_bar.tick();
        }
    }

    fn end_progress(&mut self) {
        if let Some(progress_bar) = self.progress.take() {
            progress_bar.finish_and_clear();
        }
    }

    fn read_key(&mut self) -> Option<MenuKey> {
        loop {
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
            match parse_key(&line) {
                Some(key) => return Some(key),
                None => println!("{}", key_hint()),
            }
        }
    }
}

/// Digits pick an item (1-based on screen), `w`/`k` move up, `s`/`j` move
/// down and an empty line selects.
pub(crate) fn parse_key(line: &str) -> Option<MenuKey> {
    let trimmed = line.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "" => Some(MenuKey::Select),
        "w" | "k" | "up" => Some(MenuKey::Up),
        "s" | "j" | "down" => Some(MenuKey::Down),
        _ => match trimmed.parse::<usize>() {
            Ok(number) if number >= 1 => Some(MenuKey::Item(number - 1)),
            _ => None,
        },
    }
}

fn key_hint() -> &'static str {
    "keys: <number> pick, w/k up, s/j down, enter select"
}

pub(crate) fn render_menu_lines(
    style: OutputStyle,
    headers: &[&str],
    items: &[&str],
    selected: usize,
) -> Vec<String> {
    let mut lines = headers
        .iter()
        .map(|header| match style {
            OutputStyle::Plain => header.to_string(),
            OutputStyle::Rich => colorize(header_style(), header),
        })
        .collect::<Vec<_>>();

    for (index, item) in items.iter().enumerate() {
        let marker = if index == selected { ">" } else { " " };
        let line = format!("{marker} {}. {item}", index + 1);
        lines.push(match style {
            OutputStyle::Rich if index == selected => colorize(highlight_style(), &line),
            _ => line,
        });
    }
    lines
}

fn progress_tick_chars(label: &str) -> &'static str {
    match label {
        "install" => ".oO@* ",
        "format" => "\\|/- ",
        _ => "|/-\\ ",
    }
}

fn header_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn highlight_style() -> Style {
    Style::new().effects(Effects::INVERT)
}

fn error_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightRed.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
