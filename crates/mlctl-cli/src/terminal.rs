use console::Term;

pub struct Terminal {
    inner: Term,
}

impl Terminal {
    pub fn new() -> Self {
        Terminal {
            inner: Term::stdout(),
        }
    }

    pub fn print(&self, message: &str) {
        let _ = self.inner.write_line(message);
    }

    /// Prints a YAML or JSON document without the trailing newline doubling up.
    pub fn print_document(&self, document: &str) {
        self.print(document.trim_end());
    }

    pub fn read_line(&self, prompt: &str) -> anyhow::Result<String> {
        self.inner.write_str(prompt)?;
        let line = self.inner.read_line()?;
        Ok(line)
    }

    pub fn read_confirmation(&self, prompt: &str) -> anyhow::Result<bool> {
        let response = self.read_line(&format!("{prompt} [y/n] "))?;
        match response.trim().to_lowercase().as_str() {
            "y" | "yes" => Ok(true),
            "n" | "no" => Ok(false),
            _ => Err(anyhow::anyhow!("Invalid response: {}", response)),
        }
    }
}
