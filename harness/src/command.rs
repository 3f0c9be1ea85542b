use serde_derive::{Serialize, Deserialize};

#[derive(Serialize, Deserialize)]
pub struct Execution(pub Vec<Command>);

#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
#[derive(Clone, Debug)]
pub enum Command {
    /// Start a council member with the given delivery profile
    Start {
        id: String,
        #[serde(default = "reliable")]
        profile: String,
    },

    /// Type a value into the member's prompt, proposing it
    Propose {
        id: String,
        value: String,
    },

    /// Send a raw wire line straight to the member's port
    Inject {
        id: String,
        message: String,
    },

    /// Kill the specified member
    Crash {
        id: String,
    },

    /// Sleep the test harness for `ms` milliseconds
    Sleep {
        ms: u64,
    }
}

fn reliable() -> String {
    String::from("reliable")
}
