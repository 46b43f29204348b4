//! challenge.rs
//!
//! Challenge definitions: ordered test cases paired with expected outcomes.
//! Loaded from JSON or TOML files, plus a small built-in catalog.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Callable to invoke. `None` means "just run the source".
    #[serde(default, alias = "function", skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl TestCase {
    pub fn call(target: &str, args: Vec<Value>) -> Self {
        Self {
            target: Some(target.to_string()),
            args,
            kwargs: Map::new(),
        }
    }

    /// Target with surrounding whitespace removed, `None` when blank.
    pub fn target_expr(&self) -> Option<&str> {
        self.target
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub expected_outputs: Vec<Value>,
}

fn default_difficulty() -> u8 {
    1
}

impl Challenge {
    fn new(id: &str, title: &str, description: &str, difficulty: u8, module: &str, concept: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            difficulty,
            module: module.to_string(),
            concept: concept.to_string(),
            template: String::new(),
            hints: Vec::new(),
            test_cases: Vec::new(),
            expected_outputs: Vec::new(),
        }
    }

    pub fn add_test_case(&mut self, case: TestCase, expected: Value) {
        self.test_cases.push(case);
        self.expected_outputs.push(expected);
    }

    pub fn add_hint(&mut self, hint: &str) {
        self.hints.push(hint.to_string());
    }

    fn with_template(mut self, template: &str) -> Self {
        self.template = template.to_string();
        self
    }

    fn with_cases(mut self, target: &str, cases: Vec<(Vec<Value>, Value)>) -> Self {
        for (args, expected) in cases {
            self.add_test_case(TestCase::call(target, args), expected);
        }
        self
    }
}

/// Load a challenge from `.json` or `.toml`. Unknown extensions are tried
/// as JSON.
pub fn load_challenge(path: &Path) -> Result<Challenge, String> {
    let raw = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;

    let challenge: Challenge = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&raw).map_err(|e| format!("{}: {}", path.display(), e))?,
        _ => serde_json::from_str(&raw).map_err(|e| format!("{}: {}", path.display(), e))?,
    };

    if challenge.test_cases.len() != challenge.expected_outputs.len() {
        return Err(format!(
            "{}: {} test cases but {} expected outputs",
            path.display(),
            challenge.test_cases.len(),
            challenge.expected_outputs.len()
        ));
    }

    Ok(challenge)
}

pub fn find_builtin(id: &str) -> Option<Challenge> {
    builtin_challenges().into_iter().find(|c| c.id == id)
}

/* ============================================================
   Built-in catalog
   ============================================================ */

pub fn builtin_challenges() -> Vec<Challenge> {
    let mut basic = Challenge::new(
        "core_001",
        "Basic Function Implementation",
        "Implement a function that adds two numbers",
        1,
        "core_python",
        "functions",
    )
    .with_template("def solution(a, b):\n    \"\"\"Write your function here\"\"\"\n    pass\n")
    .with_cases("solution", vec![(vec![json!(2), json!(3)], json!(5)), (vec![json!(-1), json!(1)], json!(0))]);
    basic.add_hint("Use the + operator");

    let ds = Challenge::new(
        "ds_001",
        "List Comprehension Practice",
        "Create a list of even numbers doubled",
        3,
        "data_structures",
        "list_comprehension",
    )
    .with_template("def solution(data):\n    \"\"\"Return [x*2 for x in data if x % 2 == 0]\"\"\"\n    pass\n")
    .with_cases(
        "solution",
        vec![
            (vec![json!([1, 2, 3, 4, 5])], json!([4, 8])),
            (vec![json!([1, 3, 5])], json!([])),
        ],
    );

    let oop = Challenge::new(
        "oop_001",
        "Class Implementation",
        "Create a class that processes input data",
        5,
        "object_oriented",
        "classes",
    )
    .with_template(
        "class Solution:\n    def __init__(self):\n        self.data = []\n\n    def process(self, data):\n        return f\"Processed: {data}\"\n",
    )
    .with_cases("Solution().process", vec![(vec![json!("test")], json!("Processed: test"))]);

    let mut all = vec![basic, ds, oop];
    all.extend(arcade_challenges());
    all
}

fn arcade_challenges() -> Vec<Challenge> {
    vec![
        Challenge::new("arcade_001", "Quick Sum", "Create a function that returns the sum of two integers", 1, "arcade", "functions")
            .with_template("def solution(a: int, b: int) -> int:\n    # Return the sum of a and b\n    pass\n")
            .with_cases(
                "solution",
                vec![
                    (vec![json!(1), json!(2)], json!(3)),
                    (vec![json!(-5), json!(10)], json!(5)),
                    (vec![json!(0), json!(0)], json!(0)),
                ],
            ),
        Challenge::new("arcade_002", "Even Numbers", "Return a list of even numbers from the input list", 1, "arcade", "lists")
            .with_template("def solution(numbers):\n    # Return only the even numbers from the input list\n    pass\n")
            .with_cases(
                "solution",
                vec![
                    (vec![json!([1, 2, 3, 4, 5])], json!([2, 4])),
                    (vec![json!([1, 3, 5])], json!([])),
                    (vec![json!([2, 4, 6, 8])], json!([2, 4, 6, 8])),
                ],
            ),
        Challenge::new("arcade_003", "String Reverser", "Reverse the input string", 1, "arcade", "strings")
            .with_template("def solution(s: str) -> str:\n    # Return the reversed string\n    pass\n")
            .with_cases(
                "solution",
                vec![
                    (vec![json!("hello")], json!("olleh")),
                    (vec![json!("Python")], json!("nohtyP")),
                    (vec![json!("")], json!("")),
                ],
            ),
        Challenge::new("arcade_004", "Max Value", "Find the maximum value in a list of integers", 1, "arcade", "lists")
            .with_template("def solution(numbers):\n    # Return the maximum value in the list\n    pass\n")
            .with_cases(
                "solution",
                vec![
                    (vec![json!([1, 5, 3, 9, 2])], json!(9)),
                    (vec![json!([-1, -5, -3])], json!(-1)),
                    (vec![json!([42])], json!(42)),
                ],
            ),
        Challenge::new("arcade_005", "Word Counter", "Count the number of words in a sentence", 1, "arcade", "strings")
            .with_template("def solution(sentence: str) -> int:\n    # Return the number of words in the sentence\n    pass\n")
            .with_cases(
                "solution",
                vec![
                    (vec![json!("Hello world")], json!(2)),
                    (vec![json!("Python is awesome")], json!(3)),
                    (vec![json!("")], json!(0)),
                ],
            ),
    ]
}
