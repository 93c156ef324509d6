//! Subprocess-backed filters.
//!
//! An [`ExternalTool`] wraps a command line. Placeholders in the argument
//! list control how data moves:
//!
//! | Placeholder | Replaced by                          | Without it             |
//! |-------------|--------------------------------------|------------------------|
//! | `{input}`   | temp file holding the input          | input piped to stdin   |
//! | `{output}`  | temp file the tool writes the result | result read from stdout|
//! | `{source}`  | path of the current source file      | -                      |
//!
//! The program can be overridden per environment with the `<NAME>_BIN`
//! option (e.g. `SASS_BIN=/opt/sass/bin/sass`).

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use tempfile::TempDir;

use super::{
    Filter, FilterContext, FilterOption, Hook, InputFilter, MaxDebugLevel, OpenFilter,
    OutputFilter,
};
use crate::env::Environment;
use crate::error::{Error, Result};
use crate::utils::exec::Cmd;

const INPUT: &str = "{input}";
const OUTPUT: &str = "{output}";
const SOURCE: &str = "{source}";

#[derive(Debug, Clone)]
pub struct ExternalTool {
    name: String,
    argv: Vec<String>,
    hook: Hook,
    max_debug_level: MaxDebugLevel,
}

impl ExternalTool {
    /// Wrap `argv` as a filter for `hook` (`open`, `input` or `output`).
    pub fn new(name: impl Into<String>, argv: Vec<String>, hook: Hook) -> Result<Self> {
        let name = name.into();
        if argv.is_empty() {
            return Err(Error::config(format!("filter `{name}` has an empty command")));
        }
        if hook == Hook::Concat {
            return Err(Error::config(format!(
                "filter `{name}`: external tools cannot implement `concat`"
            )));
        }
        Ok(Self {
            name,
            argv,
            hook,
            max_debug_level: MaxDebugLevel::default(),
        })
    }

    pub fn with_max_debug_level(mut self, level: MaxDebugLevel) -> Self {
        self.max_debug_level = level;
        self
    }

    /// Option naming an alternative program, e.g. `SASS_BIN`.
    pub fn bin_option(&self) -> String {
        format!("{}_BIN", self.name.to_ascii_uppercase().replace('-', "_"))
    }

    fn program(&self, env: &Environment) -> String {
        env.option(&self.bin_option())
            .unwrap_or_else(|| self.argv[0].clone())
    }

    /// Run the tool over `input`.
    fn run(&self, input: &[u8], ctx: &FilterContext<'_>) -> anyhow::Result<Vec<u8>> {
        let tmp = TempDir::new().context("cannot create temp directory")?;
        let input_path = tmp.path().join("input");
        let output_path = tmp.path().join("output");

        let uses_input = self.argv.iter().any(|a| a.contains(INPUT));
        let uses_output = self.argv.iter().any(|a| a.contains(OUTPUT));
        if uses_input {
            std::fs::write(&input_path, input).context("cannot write tool input")?;
        }

        let source = ctx
            .source_path
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let args = self.argv[1..].iter().map(|arg| {
            arg.replace(INPUT, &input_path.to_string_lossy())
                .replace(OUTPUT, &output_path.to_string_lossy())
                .replace(SOURCE, &source)
        });

        let mut cmd = Cmd::new(self.program(ctx.env)).args(args);
        if let Some(dir) = ctx.source_path.and_then(Path::parent) {
            cmd = cmd.cwd(dir);
        }
        if !uses_input {
            cmd = cmd.stdin(input);
        }
        let output = cmd.run()?;

        if uses_output {
            std::fs::read(&output_path)
                .with_context(|| format!("`{}` did not write its output file", self.name))
        } else {
            Ok(output.stdout)
        }
    }
}

impl Filter for ExternalTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> String {
        format!("{}:{}:{}", self.name, self.hook, self.argv.join("\u{1f}"))
    }

    fn max_debug_level(&self) -> MaxDebugLevel {
        self.max_debug_level
    }

    fn options(&self) -> Vec<FilterOption> {
        vec![FilterOption::optional(self.bin_option())]
    }

    fn setup(&self, env: &Environment) -> Result<()> {
        let program = self.program(env);
        which::which(&program).map_err(|_| {
            Error::config(format!(
                "filter `{}`: program `{program}` not found (set {} to override)",
                self.name,
                self.bin_option()
            ))
        })?;
        Ok(())
    }

    fn as_open(&self) -> Option<&dyn OpenFilter> {
        (self.hook == Hook::Open).then_some(self as &dyn OpenFilter)
    }

    fn as_input(&self) -> Option<&dyn InputFilter> {
        (self.hook == Hook::Input).then_some(self as &dyn InputFilter)
    }

    fn as_output(&self) -> Option<&dyn OutputFilter> {
        (self.hook == Hook::Output).then_some(self as &dyn OutputFilter)
    }
}

impl OpenFilter for ExternalTool {
    fn open(
        &self,
        out: &mut dyn Write,
        source_path: &Path,
        ctx: &FilterContext<'_>,
    ) -> anyhow::Result<()> {
        let input = std::fs::read(source_path)
            .with_context(|| format!("cannot read {}", source_path.display()))?;
        let ctx = FilterContext {
            source_path: Some(source_path),
            ..*ctx
        };
        out.write_all(&self.run(&input, &ctx)?)?;
        Ok(())
    }
}

impl InputFilter for ExternalTool {
    fn input(
        &self,
        input: &[u8],
        out: &mut dyn Write,
        ctx: &FilterContext<'_>,
    ) -> anyhow::Result<()> {
        out.write_all(&self.run(input, ctx)?)?;
        Ok(())
    }
}

impl OutputFilter for ExternalTool {
    fn output(
        &self,
        input: &[u8],
        out: &mut dyn Write,
        ctx: &FilterContext<'_>,
    ) -> anyhow::Result<()> {
        out.write_all(&self.run(input, ctx)?)?;
        Ok(())
    }
}
