//env
pub const TALLY_API_KEY_NOT_SET: &str = "TALLY_API_KEY not set!";
pub const OPENAI_API_KEY_NOT_SET: &str = "OPENAI_API_KEY not set!";

//involvement
pub const NO_SUPPORTED_DAOS: &str = "No supported DAOs found";

//assistant
pub const ASSISTANT_UNAVAILABLE: &str =
    "I'm having trouble reaching the language model right now. Please try again in a moment.";
pub const IMPACT_ANALYSIS_FAILED: &str = "Could not analyze impact";
