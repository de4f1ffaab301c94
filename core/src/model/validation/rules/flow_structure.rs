//! Rule: Flow Structure
//!
//! Checks the shape of the element graph:
//!
//! - element ids are unique across the process
//! - sequence flows connect elements of the same scope
//! - every scope has a start event
//! - start events inside sub-processes are plain start events

use std::collections::HashSet;

use crate::model::definition::{FlowNode, FlowNodeKind, Process, SequenceFlow};

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub struct FlowStructureRule;

impl FlowStructureRule {
    fn check_scope(
        &self,
        scope_id: &str,
        scope_type: &'static str,
        elements: &[FlowNode],
        flows: &[SequenceFlow],
        errors: &mut Vec<ValidationError>,
    ) {
        let is_sub_process = scope_type == "SubProcess";
        let ids: HashSet<&str> = elements.iter().map(|e| e.id.as_str()).collect();

        let start_events: Vec<_> = elements
            .iter()
            .filter_map(|e| match &e.kind {
                FlowNodeKind::StartEvent(start) => Some((e, start)),
                _ => None,
            })
            .collect();

        if start_events.is_empty() {
            errors.push(ValidationError::error(
                scope_id,
                scope_type,
                "Must have at least one start event",
                self.id(),
            ));
        }

        if is_sub_process {
            for (element, start) in &start_events {
                if start.message.is_some() || start.timer.is_some() {
                    errors.push(ValidationError::error(
                        &element.id,
                        "StartEvent",
                        "Start events in sub-processes must be of type none",
                        self.id(),
                    ));
                }
            }
        }

        for flow in flows {
            for (end, reference) in [("source", &flow.source), ("target", &flow.target)] {
                if !ids.contains(reference.as_str()) {
                    errors.push(ValidationError::error(
                        &flow.id,
                        "SequenceFlow",
                        format!(
                            "Expected {} '{}' to be an element of '{}'",
                            end, reference, scope_id
                        ),
                        self.id(),
                    ));
                }
            }
        }

        for element in elements {
            if let FlowNodeKind::SubProcess(sub) = &element.kind {
                self.check_scope(
                    &element.id,
                    "SubProcess",
                    &sub.elements,
                    &sub.sequence_flows,
                    errors,
                );
            }
        }
    }
}

impl ValidationRule for FlowStructureRule {
    fn id(&self) -> &'static str {
        "flow-structure"
    }

    fn description(&self) -> &'static str {
        "Elements must have unique ids and be connected within their scope"
    }

    fn validate(
        &self,
        process: &Process,
        _context: &ValidationContext<'_>,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let mut seen = HashSet::new();
        for node in process.flow_nodes() {
            if !seen.insert(node.id.as_str()) {
                errors.push(ValidationError::error(
                    &node.id,
                    node.kind.type_name(),
                    format!("Duplicate element id '{}'", node.id),
                    self.id(),
                ));
            }
        }

        self.check_scope(
            &process.id,
            "Process",
            &process.elements,
            &process.sequence_flows,
            &mut errors,
        );

        errors
    }
}
