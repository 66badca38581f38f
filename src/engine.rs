use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::process::{Command, Stdio};
use std::sync::Arc;

use crate::dialect::DialectKind;
use crate::error::EngineError;
use crate::provider::{ConversionOptions, EngineLoader, TexMacro, TypesettingEngine};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tex: CommandSpec,
    pub mathml: CommandSpec,
    pub ascii: CommandSpec,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tex: CommandSpec::new("tex2svg"),
            mathml: CommandSpec::new("mml2svg"),
            ascii: CommandSpec::new("am2svg"),
        }
    }
}

/// Loader that checks the converter commands can be spawned.
#[derive(Debug, Clone, Default)]
pub struct CommandEngineLoader {
    config: EngineConfig,
}

impl CommandEngineLoader {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl EngineLoader for CommandEngineLoader {
    fn fetch(&self) -> BoxFuture<'static, Result<Arc<dyn TypesettingEngine>, EngineError>> {
        let config = self.config.clone();
        let (tx, rx) = oneshot::channel();
        let spawned = std::thread::Builder::new()
            .name("mathtext-engine-probe".to_string())
            .spawn(move || {
                let outcome = probe(&config.tex).map(|()| config);
                let _ = tx.send(outcome);
            });
        async move {
            spawned.map_err(|err| EngineError::Unavailable(err.to_string()))?;
            let config = rx
                .await
                .map_err(|_| EngineError::Unavailable("engine probe exited early".to_string()))??;
            log::debug!("typesetting engine commands available: {:?}", config.tex.program);
            Ok(Arc::new(CommandEngine { config }) as Arc<dyn TypesettingEngine>)
        }
        .boxed()
    }
}

fn probe(spec: &CommandSpec) -> Result<(), EngineError> {
    spec.command()
        .arg("--help")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|_| ())
        .map_err(|err| EngineError::Unavailable(format!("{}: {err}", spec.program)))
}

pub struct CommandEngine {
    config: EngineConfig,
}

impl CommandEngine {
    fn run(
        &self,
        dialect: DialectKind,
        spec: &CommandSpec,
        formula: &str,
        options: &ConversionOptions,
    ) -> Result<String, EngineError> {
        let mut command = spec.command();
        command
            .arg("--em")
            .arg(options.em.to_string())
            .arg("--ex")
            .arg(options.ex.to_string());
        if dialect == DialectKind::Tex && !options.display {
            command.arg("--inline");
        }
        let output = command
            .arg("--")
            .arg(formula)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| EngineError::Conversion {
                dialect,
                message: format!("{}: {err}", spec.program),
            })?;
        if !output.status.success() {
            return Err(EngineError::Conversion {
                dialect,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        String::from_utf8(output.stdout)
            .map_err(|err| EngineError::MalformedOutput(err.to_string()))
    }
}

impl TypesettingEngine for CommandEngine {
    fn tex_to_svg(
        &self,
        formula: &str,
        options: &ConversionOptions,
    ) -> Result<String, EngineError> {
        let source = with_macro_definitions(formula, &options.macros);
        self.run(DialectKind::Tex, &self.config.tex, &source, options)
    }

    fn mathml_to_svg(
        &self,
        formula: &str,
        options: &ConversionOptions,
    ) -> Result<String, EngineError> {
        self.run(DialectKind::Mathml, &self.config.mathml, formula, options)
    }

    fn ascii_to_svg(
        &self,
        formula: &str,
        options: &ConversionOptions,
    ) -> Result<String, EngineError> {
        self.run(DialectKind::Ascii, &self.config.ascii, formula, options)
    }
}

/// Prefixes `\newcommand` definitions for each macro.
pub fn with_macro_definitions(formula: &str, macros: &BTreeMap<String, TexMacro>) -> String {
    if macros.is_empty() {
        return formula.to_string();
    }
    let mut source = String::new();
    for (name, TexMacro { body, args }) in macros {
        let name = name.trim_start_matches('\\');
        if *args > 0 {
            source.push_str(&format!("\\newcommand{{\\{name}}}[{args}]{{{body}}}"));
        } else {
            source.push_str(&format!("\\newcommand{{\\{name}}}{{{body}}}"));
        }
    }
    source.push(' ');
    source.push_str(formula);
    source
}
