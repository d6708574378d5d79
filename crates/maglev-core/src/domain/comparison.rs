use serde::{Deserialize, Serialize};

/// One commit between baseline and candidate, as listed by source control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    pub author_login: Option<String>,
    pub message: String,
    pub html_url: Option<String>,
}

impl CommitSummary {
    /// First line of the commit message.
    pub fn headline(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

/// Relationship between a baseline commit (`base`) and a candidate commit (`head`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub base: String,
    pub head: String,
    /// Commits the baseline is missing.
    pub ahead_by: u32,
    /// Commits the candidate is missing.
    pub behind_by: u32,
    pub html_url: Option<String>,
    /// Intervening commits, oldest first.
    pub commits: Vec<CommitSummary>,
}

impl ComparisonResult {
    pub fn is_behind(&self) -> bool {
        self.behind_by > 0
    }

    pub fn is_ahead(&self) -> bool {
        self.ahead_by > 0
    }

    /// A pure fast-forward: head has commits base lacks and lacks none of base's.
    pub fn is_only_ahead(&self) -> bool {
        self.is_ahead() && !self.is_behind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison(ahead_by: u32, behind_by: u32) -> ComparisonResult {
        ComparisonResult {
            base: "base".to_string(),
            head: "head".to_string(),
            ahead_by,
            behind_by,
            html_url: None,
            commits: Vec::new(),
        }
    }

    #[test]
    fn test_is_only_ahead_table() {
        assert!(comparison(3, 0).is_only_ahead());
        assert!(!comparison(0, 0).is_only_ahead());
        assert!(!comparison(2, 1).is_only_ahead());
        assert!(!comparison(0, 4).is_only_ahead());
    }

    #[test]
    fn test_is_only_ahead_matches_definition() {
        for ahead in 0..4 {
            for behind in 0..4 {
                let c = comparison(ahead, behind);
                assert_eq!(c.is_only_ahead(), ahead > 0 && behind == 0);
                assert_eq!(c.is_ahead(), ahead > 0);
                assert_eq!(c.is_behind(), behind > 0);
            }
        }
    }

    #[test]
    fn test_commit_headline() {
        let commit = CommitSummary {
            sha: "abc".to_string(),
            author_login: Some("octocat".to_string()),
            message: "Fix checkout total\n\nLonger body".to_string(),
            html_url: None,
        };
        assert_eq!(commit.headline(), "Fix checkout total");
    }
}
