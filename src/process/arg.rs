use crate::{helper::tracing::level_enabled, process::filter::LogLevel};

/// Controls when an argument is passed and how it shows in diagnostics.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgVisibility {
    /// Always passed and shown
    #[default]
    Always,
    /// Only passed when debug diagnostics are enabled, typically a verbosity
    /// flag for the child
    Debug,
    /// Only passed when trace diagnostics are enabled
    Trace,
    /// Only passed when dump diagnostics are enabled, see
    /// [`DUMP_TARGET`](crate::process::filter::DUMP_TARGET)
    Dump,
    /// Only passed when trace diagnostics are disabled, typically a quiet flag
    Quiet,
    /// Always passed, but masked in the rendered command line
    Secret,
}

/// Formatting flags for a single argument.
///
/// # Examples
///
/// ```rust
/// use tcrm_process::process::arg::{ArgFlags, ArgVisibility};
///
/// let flags = ArgFlags::new().quote().forward_slashes();
/// assert!(flags.quote && flags.forward_slashes);
/// assert_eq!(flags.visibility, ArgVisibility::Always);
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArgFlags {
    pub visibility: ArgVisibility,
    /// Always quote the value in the rendered command line
    pub quote: bool,
    /// Join to the previous token instead of starting a new one
    pub no_space: bool,
    /// Replace `\` with `/` in the value
    pub forward_slashes: bool,
}

impl ArgFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visibility(mut self, visibility: ArgVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn quote(mut self) -> Self {
        self.quote = true;
        self
    }

    pub fn no_space(mut self) -> Self {
        self.no_space = true;
        self
    }

    pub fn forward_slashes(mut self) -> Self {
        self.forward_slashes = true;
        self
    }

    pub fn secret(self) -> Self {
        self.visibility(ArgVisibility::Secret)
    }
}

/// One command line argument, optionally in `name value` form.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: String,
    pub flags: ArgFlags,
}

impl Arg {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            name: None,
            value: value.into(),
            flags: ArgFlags::default(),
        }
    }

    /// A `name value` pair, rendered as `name=value` without the space when
    /// `name` ends with `=` or the `no_space` flag is set.
    pub fn named(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
            flags: ArgFlags::default(),
        }
    }

    pub fn flags(mut self, flags: ArgFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Whether the argument is passed given the active diagnostics level.
    pub fn is_active(&self) -> bool {
        match self.flags.visibility {
            ArgVisibility::Always | ArgVisibility::Secret => true,
            ArgVisibility::Debug => level_enabled(LogLevel::Debug),
            ArgVisibility::Trace => level_enabled(LogLevel::Trace),
            ArgVisibility::Dump => level_enabled(LogLevel::Dump),
            ArgVisibility::Quiet => !level_enabled(LogLevel::Trace),
        }
    }

    fn value_text(&self) -> String {
        if self.flags.forward_slashes {
            self.value.replace('\\', "/")
        } else {
            self.value.clone()
        }
    }

    fn joins_name(&self) -> bool {
        match &self.name {
            Some(name) => self.flags.no_space || name.ends_with('='),
            None => false,
        }
    }
}

/// Argument vector given to the OS and command line shown in diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedArgs {
    pub argv: Vec<String>,
    pub display: String,
}

/// Renders arguments for spawning and for diagnostics.
///
/// Values are passed to the OS verbatim. Quoting only affects the display
/// string, where a value is quoted when it contains whitespace, is empty, or
/// has the `quote` flag. With both `quote` and `no_space`, the quoted value
/// is joined to the previous token: `--out="a b"`.
///
/// Inactive arguments (see [`Arg::is_active`]) and arguments with neither a
/// name nor a value are skipped.
pub fn render_args(args: &[Arg]) -> RenderedArgs {
    let mut rendered = RenderedArgs::default();

    for arg in args {
        if !arg.is_active() {
            continue;
        }
        if arg.name.as_deref().is_none_or(str::is_empty) && arg.value.is_empty() {
            continue;
        }

        let value = arg.value_text();
        let shown = if arg.flags.visibility == ArgVisibility::Secret {
            "***".to_string()
        } else {
            display_value(&value, arg.flags.quote)
        };

        match arg.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) if arg.joins_name() => {
                rendered.argv.push(format!("{}{}", name, value));
                push_token(&mut rendered.display, &format!("{}{}", name, shown), false);
            }
            Some(name) => {
                rendered.argv.push(name.to_string());
                push_token(&mut rendered.display, name, false);
                if !value.is_empty() {
                    rendered.argv.push(value);
                    push_token(&mut rendered.display, &shown, false);
                }
            }
            None if arg.flags.no_space && !rendered.argv.is_empty() => {
                if let Some(last) = rendered.argv.last_mut() {
                    last.push_str(&value);
                }
                push_token(&mut rendered.display, &shown, true);
            }
            None => {
                rendered.argv.push(value);
                push_token(&mut rendered.display, &shown, false);
            }
        }
    }

    rendered
}

/// Renders the full command line for diagnostics.
pub fn render_command_line(binary: &str, args: &[Arg]) -> String {
    let rendered = render_args(args);
    let binary = display_value(binary, false);
    if rendered.display.is_empty() {
        binary
    } else {
        format!("{} {}", binary, rendered.display)
    }
}

fn display_value(value: &str, force_quote: bool) -> String {
    if force_quote || value.is_empty() || value.chars().any(char::is_whitespace) {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

fn push_token(display: &mut String, token: &str, join: bool) {
    if !join && !display.is_empty() {
        display.push(' ');
    }
    display.push_str(token);
}
