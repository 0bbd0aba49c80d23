/// Execution classes used for task spawning and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Time-sliced parse work driven by a session's serial queue.
	Parse,
	/// Grammar fetch and decode.
	GrammarLoad,
	/// Waiting on an external event (grammar availability) under a cancellation scope.
	Wait,
	/// Bookkeeping that drives a memoized value to completion.
	Memo,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Parse => "parse",
			Self::GrammarLoad => "grammar_load",
			Self::Wait => "wait",
			Self::Memo => "memo",
		}
	}
}
