use std::time::Duration;

use super::assertions::Assertion;

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Event source
    Connect {
        connection: String,
    },
    Deliver {
        connection: String,
        fields: Vec<(String, String)>,
    },
    DeliverAfterEnd {
        connection: String,
        fields: Vec<(String, String)>,
    },
    EndStream,

    // Time control
    Wait {
        duration: Duration,
    },

    // Pre/post test conditions
    SetResources {
        instance: String,
        resources: Vec<String>,
    },
    DropInstance {
        instance: String,
    },
    EvaluatePreChecks,
    EvaluatePostChecks,

    // Assertions (can be interspersed)
    Assert {
        assertion: Assertion,
    },
}
