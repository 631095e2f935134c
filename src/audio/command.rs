//! MML rendering through an external command-line renderer.
//!
//! The renderer is configured with a command template such as
//! `mml2wav {input} -o {output}`. `{input}` is replaced with the path of a
//! temporary file holding the MML text and `{output}` with the path the
//! renderer must write a WAV file to.

use super::buffer::AudioBuffer;
use super::synth::{MmlRenderer, SynthError};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use uuid::Uuid;

/// Placeholder for the MML input file in a command template.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Placeholder for the WAV output file in a command template.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Removes a temporary file when dropped.
struct TempFile(PathBuf);

impl TempFile {
    fn new(dir: &Path, extension: &str) -> Self {
        Self(dir.join(format!("mmltui-{}.{}", Uuid::new_v4(), extension)))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = fs::remove_file(&self.0) {
                tracing::warn!("Failed to remove temporary file {:?}: {}", self.0, e);
            }
        }
    }
}

/// Renders MML by running an external program.
///
/// The last rendering is cached per MML text, so asking for the duration
/// and then rendering the same text runs the program once.
#[derive(Debug)]
pub struct CommandRenderer {
    /// Command template split into program and arguments.
    template: Vec<String>,
    /// Directory for temporary input and output files.
    work_dir: PathBuf,
    /// Most recent rendering, keyed by its MML text.
    cache: Option<(String, Option<AudioBuffer>)>,
}

impl CommandRenderer {
    /// Creates a renderer from a command template.
    ///
    /// # Errors
    ///
    /// Returns error if the template is empty or lacks `{output}`.
    pub fn new(template: &str) -> Result<Self, SynthError> {
        let template: Vec<String> = template.split_whitespace().map(String::from).collect();
        if template.is_empty() {
            return Err(SynthError::InvalidCommand("command is empty".to_string()));
        }
        if !template.iter().any(|arg| arg.contains(OUTPUT_PLACEHOLDER)) {
            return Err(SynthError::InvalidCommand(format!(
                "command must contain {}",
                OUTPUT_PLACEHOLDER
            )));
        }

        Ok(Self {
            template,
            work_dir: std::env::temp_dir(),
            cache: None,
        })
    }

    /// Returns a copy of this renderer without its cache.
    pub fn detached(&self) -> Self {
        Self {
            template: self.template.clone(),
            work_dir: self.work_dir.clone(),
            cache: None,
        }
    }

    /// Substitutes the file placeholders into the template.
    fn command_line(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.template
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }

    /// Runs the external renderer once.
    fn run(&self, mml: &str) -> Result<Option<AudioBuffer>, SynthError> {
        let input = TempFile::new(&self.work_dir, "mml");
        let output = TempFile::new(&self.work_dir, "wav");
        fs::write(input.path(), mml)?;

        let args = self.command_line(input.path(), output.path());
        let program = &args[0];
        tracing::debug!("Running renderer: {:?}", args);

        let result = Command::new(program)
            .args(&args[1..])
            .stdin(Stdio::null())
            .output()
            .map_err(|source| SynthError::Launch {
                program: program.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(SynthError::RendererFailed {
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        if !output.path().exists() {
            tracing::warn!("Renderer exited successfully but wrote no audio");
            return Ok(None);
        }

        Ok(Some(AudioBuffer::read_wav(output.path())?))
    }

    /// Renders the complete performance, using the cache when possible.
    fn render_full(&mut self, mml: &str) -> Result<Option<AudioBuffer>, SynthError> {
        if let Some((text, buffer)) = &self.cache {
            if text == mml {
                return Ok(buffer.clone());
            }
        }

        let buffer = self.run(mml)?;
        self.cache = Some((mml.to_string(), buffer.clone()));
        Ok(buffer)
    }
}

impl MmlRenderer for CommandRenderer {
    fn duration(&mut self, mml: &str) -> Result<f64, SynthError> {
        Ok(self
            .render_full(mml)?
            .map(|buffer| buffer.duration().as_secs_f64())
            .unwrap_or(0.0))
    }

    fn render(
        &mut self,
        mml: &str,
        duration_secs: f64,
    ) -> Result<Option<AudioBuffer>, SynthError> {
        let buffer = match self.cache.take() {
            Some((text, buffer)) if text == mml => buffer,
            _ => self.run(mml)?,
        };
        Ok(buffer.map(|b| b.fit_to_duration(duration_secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_validation() {
        assert!(matches!(
            CommandRenderer::new("   "),
            Err(SynthError::InvalidCommand(_))
        ));
        assert!(matches!(
            CommandRenderer::new("mml2wav {input}"),
            Err(SynthError::InvalidCommand(_))
        ));
        assert!(CommandRenderer::new("mml2wav {input} -o {output}").is_ok());
    }

    #[test]
    fn test_command_line_substitution() {
        let renderer = CommandRenderer::new("mml2wav --in={input} {output}").unwrap();
        let args = renderer.command_line(Path::new("/tmp/a.mml"), Path::new("/tmp/b.wav"));
        assert_eq!(args, vec!["mml2wav", "--in=/tmp/a.mml", "/tmp/b.wav"]);
    }

    #[test]
    fn test_detached_drops_cache() {
        let mut renderer = CommandRenderer::new("r {output}").unwrap();
        renderer.cache = Some(("cde".to_string(), None));
        assert!(renderer.detached().cache.is_none());
    }

    #[test]
    fn test_missing_program_is_launch_error() {
        let mut renderer =
            CommandRenderer::new("mmltui-renderer-that-does-not-exist {input} {output}").unwrap();
        assert!(matches!(
            renderer.duration("cde"),
            Err(SynthError::Launch { .. })
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_renderer_without_output_yields_no_buffer() {
        // `true` succeeds without writing the WAV file
        let mut renderer = CommandRenderer::new("true {input} {output}").unwrap();
        assert_eq!(renderer.duration("cde").unwrap(), 0.0);
        assert!(renderer.render("cde", 1.0).unwrap().is_none());
    }
}
