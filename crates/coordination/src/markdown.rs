//! Task extraction from embedded wish markdown.
//!
//! Wishes carry their plan as markdown: a total `Budget:` line and either
//! numbered task sections or a single `Task:` line.  Budgets are split by
//! floor division across the extracted tasks.

/// A task parsed out of the embedded message, before ids are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTask {
    pub title: String,
    pub description: String,
    pub skills: Vec<String>,
}

/// Parse result: tasks plus the declared total budget in sats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPlan {
    pub tasks: Vec<ParsedTask>,
    pub total_budget_sats: u64,
}

impl ParsedPlan {
    /// Per-task budget: floor(total / task count).
    pub fn budget_per_task(&self) -> u64 {
        if self.tasks.is_empty() {
            0
        } else {
            self.total_budget_sats / self.tasks.len() as u64
        }
    }
}

/// Extract the plan from an embedded markdown message.
pub fn parse_plan(message: &str) -> ParsedPlan {
    let total_budget_sats = find_budget(message).unwrap_or(0);

    let mut tasks = Vec::new();
    let mut current: Option<ParsedTask> = None;

    for line in message.lines() {
        let trimmed = line.trim();

        if let Some(title) = numbered_title(trimmed) {
            if let Some(done) = current.take() {
                tasks.push(done);
            }
            current = Some(ParsedTask {
                title,
                description: String::new(),
                skills: Vec::new(),
            });
            continue;
        }

        let Some(task) = current.as_mut() else {
            continue;
        };

        if let Some(skills) = trimmed.strip_prefix("Skills:") {
            task.skills = skills
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        } else if trimmed.starts_with("Budget:") || trimmed.is_empty() {
            // Budget lines and blanks are not part of the description.
        } else {
            if !task.description.is_empty() {
                task.description.push('\n');
            }
            task.description.push_str(trimmed);
        }
    }
    if let Some(done) = current.take() {
        tasks.push(done);
    }

    // No numbered sections: a bare `Task:` line is a one-task plan.
    if tasks.is_empty() {
        if let Some(title) = message.lines().find_map(|l| {
            l.trim()
                .strip_prefix("Task:")
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        }) {
            tasks.push(ParsedTask {
                title,
                description: String::new(),
                skills: Vec::new(),
            });
        }
    }

    ParsedPlan {
        tasks,
        total_budget_sats,
    }
}

/// `1. Title`, `2) Title`, or `### Task 3: Title` headings.
fn numbered_title(line: &str) -> Option<String> {
    let line = line.trim_start_matches('#').trim();

    if let Some(rest) = line
        .strip_prefix("Task ")
        .and_then(|r| r.split_once(':'))
        .map(|(_, title)| title)
    {
        let title = rest.trim();
        if !title.is_empty() {
            return Some(title.to_string());
        }
    }

    let mut chars = line.char_indices();
    let digits_end = chars
        .by_ref()
        .take_while(|(_, c)| c.is_ascii_digit())
        .map(|(i, _)| i + 1)
        .last()?;
    let rest = &line[digits_end..];
    let title = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    let title = title.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// First `Budget: <n>` line, in sats.
fn find_budget(message: &str) -> Option<u64> {
    message.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("Budget:")?;
        let digits: String = rest
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '_' || *c == ',')
            .filter(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    })
}
