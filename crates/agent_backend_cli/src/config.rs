use std::path::PathBuf;

/// Launch configuration for the backend CLI subprocess.
#[derive(Debug, Clone)]
pub struct CliBackendConfig {
    /// Executable spawned for each connection.
    pub program: String,
    /// System prompt injected into every session.
    pub system_prompt: Option<String>,
    /// Tool names the backend may request without extra configuration.
    pub allowed_tools: Vec<String>,
    /// Working directory handed to the subprocess.
    pub cwd: Option<PathBuf>,
    /// Extra arguments appended verbatim after the generated ones.
    pub extra_args: Vec<String>,
}

impl Default for CliBackendConfig {
    fn default() -> Self {
        Self {
            program: "claude".to_string(),
            system_prompt: None,
            allowed_tools: Vec::new(),
            cwd: None,
            extra_args: Vec::new(),
        }
    }
}

impl CliBackendConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_allowed_tools(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        self.allowed_tools = tools.into_iter().collect();
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn push_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }
}
