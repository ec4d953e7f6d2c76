use std::fmt;

/// One entry of a QEMU option list (`key=value` or a bare flag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptArg {
    KeyValue { key: String, value: String },
    Flag(String),
}

impl OptArg {
    pub fn kv(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Self::Flag(name.into())
    }

    pub fn key(&self) -> &str {
        match self {
            Self::KeyValue { key, .. } => key,
            Self::Flag(name) => name,
        }
    }
}

impl fmt::Display for OptArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyValue { key, value } => write!(f, "{key}={}", escape_opt_value(value)),
            Self::Flag(name) => f.write_str(name),
        }
    }
}

/// Doubles every `,` so the value cannot terminate its option early.
pub fn escape_opt_value(value: &str) -> String {
    value.replace(',', ",,")
}

/// Builder for comma-separated QEMU option lists such as
/// `file=disk.img,format=raw,if=ide`.
///
/// Values are escaped on output; keys and flags are trusted literals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptList {
    args: Vec<OptArg>,
}

impl OptList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a list with a leading bare value, e.g. a driver or backend name.
    pub fn with_head(head: impl Into<String>) -> Self {
        let mut list = Self::new();
        list.flag(head);
        list
    }

    pub fn arg(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        self.args.retain(|a| a.key() != key);
        self.args.push(OptArg::kv(key, value));
        self
    }

    pub fn flag(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.args.retain(|a| a.key() != name);
        self.args.push(OptArg::Flag(name));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|a| match a {
            OptArg::KeyValue { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn build(&self) -> String {
        self.args
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A compiled hypervisor invocation: program plus discrete arguments.
///
/// This is handed directly to the process spawner. The [`fmt::Display`]
/// rendering is shell-quoted for echoing to the user only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QemuCommand {
    program: String,
    args: Vec<String>,
}

impl QemuCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Pushes `flag` followed by the rendered option list.
    pub fn opt(&mut self, flag: &str, opts: &OptList) -> &mut Self {
        self.arg(flag).arg(opts.build())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Full argument vector, program first.
    pub fn tokens(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Whether `flag` appears as an argument.
    pub fn contains(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Values following each occurrence of `flag`.
    pub fn values_of<'a>(&'a self, flag: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.args
            .windows(2)
            .filter(move |pair| pair[0] == flag)
            .map(|pair| pair[1].as_str())
    }
}

impl fmt::Display for QemuCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=,:@%+".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
