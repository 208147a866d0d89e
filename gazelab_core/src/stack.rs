//! Execution stack and the pure transforms that re-plan it.
//!
//! Storage is a `Vec` whose last element is the top. Every splice takes the
//! stack by value and returns the new one; the sequencer is the only caller.

use crate::step::{Entry, Step};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionStack {
    entries: Vec<Entry>,
}

impl ExecutionStack {
    /// Build a stack that executes `order` front to back.
    pub fn from_template<I>(order: I) -> Self
    where
        I: IntoIterator<Item = Entry>,
    {
        let mut entries: Vec<Entry> = order.into_iter().collect();
        entries.reverse();
        Self { entries }
    }

    /// `debugging → calibration → instructions → <conditions> → end`.
    pub fn standard() -> Self {
        Self::from_template([
            Entry::Step(Step::Debugging),
            Entry::Step(Step::Calibration),
            Entry::Step(Step::Instructions),
            Entry::ConditionsPlaceholder,
            Entry::Step(Step::End),
        ])
    }

    pub fn pop(&mut self) -> Option<Entry> {
        self.entries.pop()
    }

    pub fn peek(&self) -> Option<Entry> {
        self.entries.last().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending entries in the order they will execute.
    pub fn pending(&self) -> impl Iterator<Item = Entry> + '_ {
        self.entries.iter().rev().copied()
    }

    pub fn has_placeholder(&self) -> bool {
        self.entries.contains(&Entry::ConditionsPlaceholder)
    }

    fn push(mut self, entry: Entry) -> Self {
        self.entries.push(entry);
        self
    }
}

/// Replace the placeholder with `n` groups of `jitter → stimulus → response`.
///
/// A stack without a placeholder is returned unchanged.
pub fn expand_conditions(stack: ExecutionStack, n: usize, stimulus: Step) -> ExecutionStack {
    let Some(at) = stack
        .entries
        .iter()
        .position(|e| *e == Entry::ConditionsPlaceholder)
    else {
        return stack;
    };
    let mut entries = stack.entries;
    // Stored bottom-up, so each group is laid down in reverse.
    let group = [
        Entry::Step(Step::Response),
        Entry::Step(stimulus),
        Entry::Step(Step::Jitter),
    ];
    let expanded = std::iter::repeat_n(group, n).flatten();
    entries.splice(at..=at, expanded);
    ExecutionStack { entries }
}

/// Schedule a retry of `retry` behind an `error` acknowledgment.
pub fn push_recovery(stack: ExecutionStack, retry: Step) -> ExecutionStack {
    stack
        .push(Entry::Step(retry))
        .push(Entry::Step(Step::Error))
}

/// Schedule `recalibrate` followed by another `calibration` pass.
pub fn push_recalibration(stack: ExecutionStack) -> ExecutionStack {
    stack
        .push(Entry::Step(Step::Calibration))
        .push(Entry::Step(Step::Recalibrate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(stack: &ExecutionStack) -> Vec<String> {
        stack.pending().map(|e| e.to_string()).collect()
    }

    #[test]
    fn standard_template_executes_in_order() {
        let stack = ExecutionStack::standard();
        assert_eq!(
            steps(&stack),
            vec![
                "debugging",
                "calibration",
                "instructions",
                "conditions_placeholder",
                "end"
            ]
        );
        assert_eq!(stack.peek(), Some(Entry::Step(Step::Debugging)));
    }

    #[test]
    fn expansion_lays_groups_in_execution_order() {
        let mut stack = ExecutionStack::standard();
        stack.pop();
        stack.pop();
        stack.pop();
        let stack = expand_conditions(stack, 2, Step::Clips);
        assert_eq!(
            steps(&stack),
            vec!["jitter", "clips", "response", "jitter", "clips", "response", "end"]
        );
        assert!(!stack.has_placeholder());
    }

    #[test]
    fn expansion_with_zero_conditions_drops_placeholder() {
        let stack = expand_conditions(ExecutionStack::standard(), 0, Step::Collisions);
        assert_eq!(
            steps(&stack),
            vec!["debugging", "calibration", "instructions", "end"]
        );
    }

    #[test]
    fn expansion_without_placeholder_is_identity() {
        let stack = ExecutionStack::from_template([Entry::Step(Step::End)]);
        assert_eq!(expand_conditions(stack.clone(), 3, Step::Clips), stack);
    }

    #[test]
    fn recovery_puts_error_on_top_of_retry() {
        let stack = ExecutionStack::from_template([
            Entry::Step(Step::Response),
            Entry::Step(Step::End),
        ]);
        let stack = push_recovery(stack, Step::Clips);
        assert_eq!(steps(&stack), vec!["error", "clips", "response", "end"]);
    }

    #[test]
    fn recalibration_puts_recalibrate_on_top() {
        let stack = ExecutionStack::from_template([Entry::Step(Step::Instructions)]);
        let stack = push_recalibration(stack);
        assert_eq!(
            steps(&stack),
            vec!["recalibrate", "calibration", "instructions"]
        );
    }
}
