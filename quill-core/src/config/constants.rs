//! Centralized constants for defaults, environment variables, endpoints,
//! model identifiers, and tool names.

pub mod defaults {
    /// Hard cap on tool-call rounds per user message.
    pub const MAX_TOOL_ROUNDS: usize = 50;

    /// Default number of lines returned by `read_file`.
    pub const READ_LINE_LIMIT: usize = 1000;

    /// Existing files larger than this are protected by the size-reduction guard.
    pub const SIZE_GUARD_MIN_BYTES: u64 = 1000;

    /// New content below this fraction of the old size triggers the guard.
    pub const SIZE_GUARD_RATIO: f64 = 0.10;

    /// Default cap for `search_files` results.
    pub const SEARCH_MAX_RESULTS: usize = 100;

    /// Per-category tool deadlines, in seconds.
    pub const FILE_TOOL_TIMEOUT_SECS: u64 = 30;
    pub const EXEC_TOOL_TIMEOUT_SECS: u64 = 30;
    pub const SEARCH_TOOL_TIMEOUT_SECS: u64 = 60;

    /// Transport retry policy: exponential backoff, base 1s, cap 30s.
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;
    pub const RETRY_MAX_DELAY_SECS: u64 = 30;
    pub const RETRY_MAX_ATTEMPTS: u32 = 3;

    /// Semantic patch removal blocks are searched within this many lines
    /// of the located context marker.
    pub const SEMANTIC_PATCH_SEARCH_WINDOW: usize = 50;

    /// Context lines shown around edits in preview output.
    pub const PREVIEW_CONTEXT_LINES: usize = 3;

    /// Compaction engine defaults.
    pub const COMPACTION_INVOCATION_THRESHOLD: usize = 5;
    pub const COMPACTION_OVERLAP_SIZE: usize = 2;
    pub const COMPACTION_TOKEN_THRESHOLD: u64 = 700_000;
    pub const COMPACTION_SAFETY_RATIO: f64 = 0.7;

    /// Byte budget for concatenated project instruction files.
    pub const PROJECT_DOC_MAX_BYTES: usize = 32 * 1024;
}

pub mod env_vars {
    pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
    pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const GOOGLE_CLOUD_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
    pub const GOOGLE_CLOUD_LOCATION: &str = "GOOGLE_CLOUD_LOCATION";
    pub const GEMINI_BASE_URL: &str = "GEMINI_BASE_URL";
    pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
}

pub mod urls {
    pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
    pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
}

pub mod models {
    pub mod google {
        pub const GEMINI_2_5_FLASH: &str = "gemini-2.5-flash";
        pub const GEMINI_2_5_PRO: &str = "gemini-2.5-pro";
        pub const GEMINI_2_0_FLASH: &str = "gemini-2.0-flash";

        pub const SUPPORTED_MODELS: &[&str] =
            &[GEMINI_2_5_FLASH, GEMINI_2_5_PRO, GEMINI_2_0_FLASH];
    }

    pub mod openai {
        pub const GPT_4_1: &str = "gpt-4.1";
        pub const GPT_4_1_MINI: &str = "gpt-4.1-mini";
        pub const GPT_4O: &str = "gpt-4o";

        pub const SUPPORTED_MODELS: &[&str] = &[GPT_4_1, GPT_4_1_MINI, GPT_4O];
    }
}

pub mod tools {
    pub const READ_FILE: &str = "read_file";
    pub const WRITE_FILE: &str = "write_file";
    pub const REPLACE_IN_FILE: &str = "replace_in_file";
    pub const PREVIEW_REPLACE: &str = "preview_replace";
    pub const EDIT_LINES: &str = "edit_lines";
    pub const APPLY_PATCH: &str = "apply_patch";
    pub const SEMANTIC_PATCH: &str = "semantic_patch";
    pub const LIST_DIR: &str = "list_dir";
    pub const SEARCH_FILES: &str = "search_files";
    pub const GREP_SEARCH: &str = "grep_search";
    pub const EXECUTE_COMMAND: &str = "execute_command";
    pub const EXECUTE_PROGRAM: &str = "execute_program";
}

pub mod instructions {
    /// Project instruction file discovered from the working directory upward.
    pub const PROJECT_DOC_FILE: &str = "AGENTS.md";

    /// Directory under $HOME holding the user-global instruction file.
    pub const USER_CONFIG_DIR: &str = ".quill";
}

pub mod session {
    /// Reserved custom-metadata key marking an event as a compaction summary.
    pub const COMPACTION_METADATA_KEY: &str = "quill.compaction";
}
