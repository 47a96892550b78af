//! Non-interactive [`Chooser`] implementations.

use std::collections::VecDeque;

use tracing::debug;

use crate::host::{Chooser, ChooserOutcome};
use crate::models::TypeId;

/// Always takes the first offered option.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstOptionChooser;

impl Chooser for FirstOptionChooser {
    fn choose(
        &mut self,
        _title: &str,
        options: &[TypeId],
        _render: &dyn Fn(TypeId) -> String,
    ) -> ChooserOutcome<TypeId> {
        options
            .first()
            .copied()
            .map_or(ChooserOutcome::Cancelled, ChooserOutcome::Chosen)
    }
}

/// Answers prompts from a queue of labels.
///
/// An answer matches an option whose rendered label equals it, or whose
/// label is `answer (qualified.name)`. An unmatched answer or an empty
/// queue cancels.
#[derive(Debug, Default, Clone)]
pub struct ScriptedChooser {
    answers: VecDeque<String>,
    pub prompts: Vec<String>,
}

impl ScriptedChooser {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }
}

impl Chooser for ScriptedChooser {
    fn choose(
        &mut self,
        title: &str,
        options: &[TypeId],
        render: &dyn Fn(TypeId) -> String,
    ) -> ChooserOutcome<TypeId> {
        self.prompts.push(title.to_string());
        let Some(answer) = self.answers.pop_front() else {
            return ChooserOutcome::Cancelled;
        };
        let prefix = format!("{answer} (");
        let picked = options.iter().copied().find(|&option| {
            let label = render(option);
            label == answer || label.starts_with(&prefix)
        });
        match picked {
            Some(option) => ChooserOutcome::Chosen(option),
            None => {
                debug!("Scripted answer {answer:?} matches no option for {title:?}");
                ChooserOutcome::Cancelled
            }
        }
    }
}
