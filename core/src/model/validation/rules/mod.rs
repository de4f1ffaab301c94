//! Validation Rules
//!
//! Each file in this module contains one validation rule, named after the
//! attribute it checks:
//!
//! - `flow_structure.rs` - Element ids, sequence flow endpoints and start events
//! - `condition_expression.rs` - Sequence flow conditions
//! - `io_mapping.rs` - Input and output variable mappings
//! - `subscription.rs` - Message correlation keys
//! - `loop_characteristics.rs` - Multi-instance collections
//! - `task_definition.rs` - Job type and retries of service tasks
//! - `called_element.rs` - Process id of call activities
//! - `message.rs` - Message names
//! - `timer_definition.rs` - Timer cycle, duration and date
//! - `start_event_timer.rs` - Timer start events must be statically evaluable

mod called_element;
mod condition_expression;
mod flow_structure;
mod io_mapping;
mod loop_characteristics;
mod message;
mod start_event_timer;
mod subscription;
mod task_definition;
mod timer_definition;

pub use called_element::CalledElementRule;
pub use condition_expression::ConditionExpressionRule;
pub use flow_structure::FlowStructureRule;
pub use io_mapping::IoMappingRule;
pub use loop_characteristics::LoopCharacteristicsRule;
pub use message::MessageRule;
pub use start_event_timer::{StartEventTimerRule, INVALID_TIMER_START_EVENT_MESSAGE};
pub use subscription::SubscriptionRule;
pub use task_definition::TaskDefinitionRule;
pub use timer_definition::TimerDefinitionRule;
