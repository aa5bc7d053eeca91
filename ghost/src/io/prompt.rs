//! System prompts for every completion call, rendered from bundled templates.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::core::types::SystemContext;

const COMMAND_TEMPLATE: &str = include_str!("prompts/command.md");
const CONTINUATION_TEMPLATE: &str = include_str!("prompts/continuation.md");
const EXPLANATION_VERBOSE_TEMPLATE: &str = include_str!("prompts/explanation_verbose.md");
const EXPLANATION_TERSE_TEMPLATE: &str = include_str!("prompts/explanation_terse.md");
const FILE_CONTENT_TEMPLATE: &str = include_str!("prompts/file_content.md");
const FILE_MODIFY_TEMPLATE: &str = include_str!("prompts/file_modify.md");

/// Template engine wrapper around minijinja.
pub struct PromptLibrary {
    env: Environment<'static>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptLibrary {
    pub fn new() -> Self {
        let mut env = Environment::new();
        for (name, source) in [
            ("command", COMMAND_TEMPLATE),
            ("continuation", CONTINUATION_TEMPLATE),
            ("explanation_verbose", EXPLANATION_VERBOSE_TEMPLATE),
            ("explanation_terse", EXPLANATION_TERSE_TEMPLATE),
            ("file_content", FILE_CONTENT_TEMPLATE),
            ("file_modify", FILE_MODIFY_TEMPLATE),
        ] {
            env.add_template(name, source)
                .expect("bundled prompt template should be valid");
        }
        Self { env }
    }

    /// Command generation: emit exactly one bare command for this host.
    pub fn command_generation(&self, system: &SystemContext) -> Result<String> {
        self.render("command", context! { system => system })
    }

    /// The binary CONTINUE/DONE protocol.
    pub fn continuation_analysis(&self, system: &SystemContext) -> Result<String> {
        self.render("continuation", context! { system => system })
    }

    pub fn explanation(&self, system: &SystemContext, verbose: bool) -> Result<String> {
        let name = if verbose {
            "explanation_verbose"
        } else {
            "explanation_terse"
        };
        self.render(name, context! { system => system })
    }

    pub fn file_content(
        &self,
        system: &SystemContext,
        filename: &str,
        current_content: &str,
    ) -> Result<String> {
        self.render(
            "file_content",
            context! {
                system => system,
                filename => filename,
                current_content => current_content.trim(),
            },
        )
    }

    pub fn file_modification(&self, filename: &str, current_content: &str) -> Result<String> {
        self.render(
            "file_modify",
            context! { filename => filename, current_content => current_content },
        )
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::system_context;

    #[test]
    fn command_prompt_names_host_details() {
        let prompt = PromptLibrary::new()
            .command_generation(&system_context())
            .expect("render");
        assert!(prompt.contains("- Operating System: Linux 6.1.0"));
        assert!(prompt.contains("- Shell: /bin/bash"));
        assert!(prompt.contains("- Current Directory: /home/user/project"));
        assert!(prompt.contains("ONLY return the command"));
    }

    #[test]
    fn continuation_prompt_describes_protocol() {
        let prompt = PromptLibrary::new()
            .continuation_analysis(&system_context())
            .expect("render");
        assert!(prompt.contains("\"CONTINUE\""));
        assert!(prompt.contains("\"DONE\""));
    }

    #[test]
    fn explanation_register_follows_verbosity() {
        let prompts = PromptLibrary::new();
        let verbose = prompts.explanation(&system_context(), true).expect("render");
        let terse = prompts.explanation(&system_context(), false).expect("render");
        assert!(verbose.contains("detailed explanation"));
        assert!(terse.contains("concise answer"));
    }

    #[test]
    fn file_content_prompt_keeps_literal_placeholder_example() {
        let prompts = PromptLibrary::new();
        let empty = prompts
            .file_content(&system_context(), "app.py", "  ")
            .expect("render");
        assert!(empty.contains("- Target File: app.py"));
        assert!(empty.contains("{{placeholder}}"));
        assert!(empty.ends_with("(empty file)"));

        let existing = prompts
            .file_content(&system_context(), "app.py", "print(1)\n")
            .expect("render");
        assert!(existing.ends_with("print(1)"));
    }

    #[test]
    fn modification_prompt_embeds_current_content() {
        let prompt = PromptLibrary::new()
            .file_modification("notes.txt", "first line")
            .expect("render");
        assert!(prompt.contains("File: notes.txt\nCurrent content:\nfirst line\n"));
    }
}
