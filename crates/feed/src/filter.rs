//! Pure projections over the canonical feed. Nothing here is cached; views are
//! recomputed from the current set whenever they are asked for.

use alloc::vec::Vec;
use core::{fmt, str::FromStr};
use model::{Question, Status, Visibility};

/// Tab selector over the visible questions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Mine,
    Pending,
    Answered,
}

impl Filter {
    pub const EVERY: [Self; 4] = [Self::All, Self::Mine, Self::Pending, Self::Answered];

    pub const fn id(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Mine => "mine",
            Self::Pending => "pending",
            Self::Answered => "answered",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Mine => "My Questions",
            Self::Pending => "Pending",
            Self::Answered => "Answered",
        }
    }

    /// Whether an already visible question belongs under this tab.
    pub fn matches(self, question: &Question) -> bool {
        match self {
            Self::All => true,
            Self::Mine => question.mine,
            Self::Pending => question.status == Status::Pending,
            Self::Answered => question.status == Status::Answered,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownFilter;

impl FromStr for Filter {
    type Err = UnknownFilter;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::EVERY.into_iter().find(|filter| filter.id().eq_ignore_ascii_case(text)).ok_or(UnknownFilter)
    }
}

/// Badge counts for every tab, taken over the same visible set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub all: usize,
    pub mine: usize,
    pub pending: usize,
    pub answered: usize,
}

impl Counts {
    pub const fn get(&self, filter: Filter) -> usize {
        match filter {
            Filter::All => self.all,
            Filter::Mine => self.mine,
            Filter::Pending => self.pending,
            Filter::Answered => self.answered,
        }
    }
}

/// Visibility gate. In a private room only the participant's own questions
/// exist as far as every tab is concerned.
pub fn is_visible(question: &Question, visibility: Visibility) -> bool {
    match visibility {
        Visibility::Public => true,
        Visibility::Private => question.mine,
    }
}

/// Questions shown under `filter`, in canonical order.
pub fn view<'q, I>(questions: I, visibility: Visibility, filter: Filter) -> Vec<&'q Question>
where
    I: IntoIterator<Item = &'q Question>,
{
    questions.into_iter().filter(|q| is_visible(q, visibility) && filter.matches(q)).collect()
}

pub fn counts<'q, I>(questions: I, visibility: Visibility) -> Counts
where
    I: IntoIterator<Item = &'q Question>,
{
    questions.into_iter().filter(|q| is_visible(q, visibility)).fold(Counts::default(), |mut counts, q| {
        counts.all += 1;
        counts.mine += usize::from(q.mine);
        match q.status {
            Status::Pending => counts.pending += 1,
            Status::Answered => counts.answered += 1,
        }
        counts
    })
}
