//! File-edit divert: the collaborator the loop hands control to for file authoring.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use similar::TextDiff;
use tracing::{info, instrument, warn};

use crate::core::response::strip_fence;
use crate::core::types::{SystemContext, Turn};
use crate::display::panel;
use crate::io::completion::{CompletionRequest, CompletionService};
use crate::io::confirm::Prompter;
use crate::io::prompt::PromptLibrary;

/// Opaque interactive editing session.
pub trait FileEditor {
    /// Edit `filename` for `request`; `true` means saved, `false` means cancelled.
    fn interactive_edit(
        &self,
        request: &str,
        filename: &str,
        context: &SystemContext,
    ) -> Result<bool>;
}

impl<T: FileEditor + ?Sized> FileEditor for &T {
    fn interactive_edit(
        &self,
        request: &str,
        filename: &str,
        context: &SystemContext,
    ) -> Result<bool> {
        (**self).interactive_edit(request, filename, context)
    }
}

/// Menu-driven editor that drafts and revises content through the completion service.
pub struct AssistedEditor<C, P> {
    completion: C,
    prompter: P,
    prompts: PromptLibrary,
    max_tokens: u32,
    root: PathBuf,
}

impl<C: CompletionService, P: Prompter> AssistedEditor<C, P> {
    pub fn new(completion: C, prompter: P, max_tokens: u32) -> Self {
        Self {
            completion,
            prompter,
            prompts: PromptLibrary::new(),
            max_tokens,
            root: PathBuf::from("."),
        }
    }

    /// Resolve relative filenames against `root` instead of the working directory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    fn complete(&self, system: String, user: &str) -> Result<String> {
        let request = CompletionRequest::new(
            vec![Turn::system(system), Turn::user(user)],
            self.max_tokens,
        );
        let raw = self
            .completion
            .complete(&request)
            .context("generate file content")?;
        Ok(strip_fence(&raw))
    }

    fn request_changes(&self, filename: &str, content: String) -> Result<String> {
        let change = self.prompter.ask("What changes would you like to make?")?;
        if change.is_empty() {
            println!("No changes requested.");
            return Ok(content);
        }
        let system = self.prompts.file_modification(filename, &content)?;
        let revised = self.complete(system, &change)?;
        if revised == content {
            println!("No changes were made.");
            return Ok(content);
        }

        println!("{}", panel("Changes", &unified_diff(&content, &revised, filename)));
        if self.prompter.confirm("Apply these changes?", true)? {
            println!("Changes applied.");
            Ok(revised)
        } else {
            println!("Changes discarded.");
            Ok(content)
        }
    }

    fn save(&self, path: &Path, filename: &str, content: &str) -> Result<bool> {
        loop {
            match write_file(path, content) {
                Ok(()) => {
                    info!(path = %path.display(), "file saved");
                    println!("File saved successfully: {filename}");
                    return Ok(true);
                }
                Err(err) => {
                    warn!(err = %format!("{err:#}"), "saving file failed");
                    println!("Error saving file: {err:#}");
                    if !self.prompter.confirm("Try again?", false)? {
                        return Ok(false);
                    }
                }
            }
        }
    }
}

impl<C: CompletionService, P: Prompter> FileEditor for AssistedEditor<C, P> {
    #[instrument(skip_all, fields(filename = filename))]
    fn interactive_edit(
        &self,
        request: &str,
        filename: &str,
        context: &SystemContext,
    ) -> Result<bool> {
        println!("\nEntering interactive file editing mode for: {filename}");
        let path = self.root.join(filename);

        let mut content = String::new();
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(existing) => {
                    println!("Found existing file");
                    println!("{}", panel(filename, &existing));
                    content = existing;
                }
                Err(err) => {
                    warn!(err = %err, path = %path.display(), "reading target failed");
                    println!("Error reading file: {err}");
                    return Ok(false);
                }
            }
        } else {
            println!("Creating new file");
        }

        if content.trim().is_empty() {
            println!("Generating initial content...");
            let system = self.prompts.file_content(context, filename, &content)?;
            content = self.complete(system, request)?;
            println!("{}", panel(filename, &content));
        }

        loop {
            println!("\nWhat would you like to do?");
            println!("1. Save and exit");
            println!("2. Make changes");
            println!("3. View current content");
            println!("4. Exit without saving");
            let choice = self.prompter.ask("Choose an option [1-4] (default 1)")?;
            match choice.as_str() {
                "" | "1" => return self.save(&path, filename, &content),
                "2" => content = self.request_changes(filename, content)?,
                "3" => println!("{}", panel(filename, &content)),
                "4" => {
                    if self
                        .prompter
                        .confirm("Are you sure you want to exit without saving?", false)?
                    {
                        println!("Exited without saving");
                        return Ok(false);
                    }
                }
                other => println!("Invalid option '{other}', choose 1, 2, 3 or 4."),
            }
        }
    }
}

/// Unified diff of two file versions with `a/` and `b/` headers.
pub fn unified_diff(old: &str, new: &str, filename: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{filename}"), &format!("b/{filename}"))
        .to_string()
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("write {}", path.display()))
}
