//! Vote tallying over a session's submissions.
//!
//! Pure functions: the scheduled announcement entry point feeds a closed
//! session's submission list in and gets the winner board back.

use std::collections::{BTreeMap, BTreeSet};

use database::WeeklySubmission;

/// The fixed judging categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Likeness,
    Style,
    Fun,
    TopHead,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Likeness,
        Category::Style,
        Category::Fun,
        Category::TopHead,
    ];

    /// Key under which votes for this category are stored on a submission.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Likeness => "likeness",
            Category::Style => "style",
            Category::Fun => "fun",
            Category::TopHead => "topHead",
        }
    }

    /// Name used in announcement copy.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Likeness => "Best Likeness",
            Category::Style => "Best Style",
            Category::Fun => "Most Fun",
            Category::TopHead => "Top Head",
        }
    }
}

/// Winners of one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryWinners {
    /// Submitters whose submissions drew the maximum vote count. More than
    /// one entry means a tie; all tied submitters are co-winners.
    pub user_ids: Vec<String>,
    /// The winning vote count.
    pub votes: usize,
}

impl CategoryWinners {
    pub fn is_tie(&self) -> bool {
        self.user_ids.len() > 1
    }

    pub fn tie_count(&self) -> usize {
        self.user_ids.len()
    }
}

/// Winners across all categories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WinnerBoard {
    /// Categories with at least one vote. A category where nobody voted is
    /// omitted entirely.
    pub categories: BTreeMap<Category, CategoryWinners>,
    /// Union of winner ids across categories, so the no-win broadcast never
    /// double-announces someone who already got a personal notification.
    pub all_winner_ids: BTreeSet<String>,
}

fn votes_for(submission: &WeeklySubmission, category: Category) -> usize {
    submission
        .votes
        .get(category.key())
        .map(|voters| voters.len())
        .unwrap_or(0)
}

/// Tally per-category winners over a session's submissions.
pub fn tally(submissions: &[WeeklySubmission]) -> WinnerBoard {
    let mut board = WinnerBoard::default();

    for category in Category::ALL {
        let max_votes = submissions
            .iter()
            .map(|s| votes_for(s, category))
            .max()
            .unwrap_or(0);

        if max_votes == 0 {
            continue;
        }

        let user_ids: Vec<String> = submissions
            .iter()
            .filter(|s| votes_for(*s, category) == max_votes)
            .map(|s| s.user_id.clone())
            .collect();

        for id in &user_ids {
            board.all_winner_ids.insert(id.clone());
        }
        board
            .categories
            .insert(category, CategoryWinners { user_ids, votes: max_votes });
    }

    board
}
