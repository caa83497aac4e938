//! The fixed tool set offered to every agent.
//!
//! Tool schemas are declared once in wire-neutral JSON-schema form and
//! rendered into either the native function-declaration format or the
//! chat-completions `tools` array.

use std::fmt;
use std::str::FromStr;
use tessera_core::provider::ToolDefinition;

/// Every callable tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    ListFiles,
    ReadFile,
    WriteFile,
    DeleteFile,
    CreateDirectory,
    SearchFiles,
    SearchCode,
    RunCommand,
    RenderPreview,
    FetchUrl,
}

impl ToolName {
    pub const ALL: [ToolName; 10] = [
        ToolName::ListFiles,
        ToolName::ReadFile,
        ToolName::WriteFile,
        ToolName::DeleteFile,
        ToolName::CreateDirectory,
        ToolName::SearchFiles,
        ToolName::SearchCode,
        ToolName::RunCommand,
        ToolName::RenderPreview,
        ToolName::FetchUrl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListFiles => "list_files",
            Self::ReadFile => "read_file",
            Self::WriteFile => "write_file",
            Self::DeleteFile => "delete_file",
            Self::CreateDirectory => "create_directory",
            Self::SearchFiles => "search_files",
            Self::SearchCode => "search_code",
            Self::RunCommand => "run_command",
            Self::RenderPreview => "render_preview",
            Self::FetchUrl => "fetch_url",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ListFiles => {
                "List files and directories at a path in the workspace. \
                 Set recursive to \"true\" to walk the whole subtree; build output \
                 and VCS directories are skipped."
            }
            Self::ReadFile => "Read the full text content of a file in the workspace.",
            Self::WriteFile => {
                "Write content to a file. Creates the file and any missing parent \
                 directories, overwrites it if it exists. JavaScript and TypeScript \
                 files are syntax-checked first and rejected if broken."
            }
            Self::DeleteFile => "Delete a file, or a directory and everything inside it.",
            Self::CreateDirectory => "Create a directory, including missing parents.",
            Self::SearchFiles => {
                "Find files whose name contains the query (case-insensitive). \
                 Returns matching paths."
            }
            Self::SearchCode => {
                "Search the code index by concept: keywords are matched against file \
                 paths, declared functions, classes and variables, and file contents. \
                 Results are ranked heuristically and are not exhaustive."
            }
            Self::RunCommand => {
                "Run a shell command in the workspace terminal. `cd` changes the \
                 working directory for later commands. Returns exit code, stdout, \
                 stderr and the current directory."
            }
            Self::RenderPreview => {
                "Bundle the web project in the workspace and return a URL where the \
                 live preview can be opened."
            }
            Self::FetchUrl => "Fetch an external http(s) URL and return its text content.",
        }
    }

    /// JSON-schema for the tool's arguments (lower-case types).
    pub fn parameters_schema(&self) -> serde_json::Value {
        match self {
            Self::ListFiles => serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Directory to list, relative to the workspace root. Defaults to the root."
                    },
                    "recursive": {
                        "type": "string",
                        "description": "\"true\" to list the whole subtree"
                    },
                    "exclude": {
                        "type": "array",
                        "description": "Additional directory names to skip when recursive",
                        "items": { "type": "string" }
                    }
                }
            }),
            Self::ReadFile | Self::DeleteFile | Self::CreateDirectory => serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path relative to the workspace root"
                    }
                },
                "required": ["path"]
            }),
            Self::WriteFile => serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "The file path to write to"
                    },
                    "content": {
                        "type": "string",
                        "description": "The complete new file content"
                    }
                },
                "required": ["path", "content"]
            }),
            Self::SearchFiles | Self::SearchCode => serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for"
                    }
                },
                "required": ["query"]
            }),
            Self::RunCommand => serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The shell command to execute"
                    }
                },
                "required": ["command"]
            }),
            Self::RenderPreview => serde_json::json!({
                "type": "object",
                "properties": {
                    "entry": {
                        "type": "string",
                        "description": "Entry file of the project (for example index.html)"
                    }
                }
            }),
            Self::FetchUrl => serde_json::json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "The http:// or https:// URL to fetch"
                    }
                },
                "required": ["url"]
            }),
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.as_str().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown tool: {s}"))
    }
}

/// Wire-neutral definitions of the full tool set.
pub fn definitions() -> Vec<ToolDefinition> {
    ToolName::ALL.iter().map(ToolName::definition).collect()
}

/// Native `functionDeclarations` entries.
pub fn gemini_function_declarations() -> Vec<serde_json::Value> {
    definitions()
        .iter()
        .map(ToolDefinition::to_gemini_declaration)
        .collect()
}

/// Chat-completions `tools` entries.
pub fn openai_tools() -> Vec<serde_json::Value> {
    definitions().iter().map(ToolDefinition::to_openai_tool).collect()
}
