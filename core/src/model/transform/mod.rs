//! Model transform stage
//!
//! Turns a validated workflow description into `ExecutableWorkflow`s. The
//! stage runs in passes: every flow node is instantiated first so later
//! passes can look elements up by id, then sequence flows are wired, then
//! element transformers bind type-specific behaviour (start events, catch
//! events).

mod catch_event;
mod flow_node;
mod sequence_flow;
mod start_event;


use std::sync::Arc;

use tracing::debug;

use crate::el::{Expression, ExpressionLanguage};
use crate::model::definition::{
    Definitions, FlowNode, FlowNodeKind, MessageDefinition, Process, TimerDefinition,
};
use crate::model::executable::{
    ExecutableElement, ExecutableMessage, ExecutableTimer, ExecutableWorkflow, TimerKind,
};
use crate::model::timer::{parse_date, parse_duration, RepeatingInterval};
use crate::model::validation::Validator;
use crate::model::TransformError;

pub use catch_event::CatchEventTransformer;
pub use start_event::StartEventTransformer;

/* ===================== Transform Context ===================== */

/// State shared by the passes while one process is transformed
pub struct TransformContext<'a> {
    workflow: ExecutableWorkflow,
    expression_language: &'a dyn ExpressionLanguage,
}

impl<'a> TransformContext<'a> {
    fn new(bpmn_process_id: &str, expression_language: &'a dyn ExpressionLanguage) -> Self {
        Self {
            workflow: ExecutableWorkflow::new(bpmn_process_id),
            expression_language,
        }
    }

    pub fn expression_language(&self) -> &'a dyn ExpressionLanguage {
        self.expression_language
    }

    pub fn workflow(&self) -> &ExecutableWorkflow {
        &self.workflow
    }

    pub fn workflow_mut(&mut self) -> &mut ExecutableWorkflow {
        &mut self.workflow
    }

    pub fn element_mut(&mut self, id: &str) -> Result<&mut ExecutableElement, TransformError> {
        self.workflow
            .element_mut(id)
            .ok_or_else(|| TransformError::MissingElement(id.to_string()))
    }

    pub fn parse(&self, text: &str) -> Expression {
        self.expression_language.parse_expression(text)
    }

    /// Message with a literal name if the name is static, else its expression
    pub fn message(&self, definition: &MessageDefinition) -> ExecutableMessage {
        let text = definition.name.as_deref().unwrap_or("");
        let name_expression = self.parse(text);
        let name = name_expression.is_static().then(|| text.to_string());

        ExecutableMessage {
            name,
            name_expression,
            correlation_key: definition
                .correlation_key
                .as_deref()
                .map(|key| self.parse(key)),
        }
    }

    /// Static timer values are parsed now, expressions when scheduled
    pub fn timer(&self, definition: &TimerDefinition) -> Result<Option<ExecutableTimer>, String> {
        let (kind, text) = match (&definition.cycle, &definition.duration, &definition.date) {
            (Some(cycle), _, _) => (TimerKind::Cycle, cycle),
            (_, Some(duration), _) => (TimerKind::Duration, duration),
            (_, _, Some(date)) => (TimerKind::Date, date),
            _ => return Ok(None),
        };

        let expression = self.parse(text);
        if !expression.is_static() {
            return Ok(Some(ExecutableTimer::Dynamic(kind, expression)));
        }
        static_timer(kind, text).map(Some)
    }
}

pub(crate) fn static_timer(kind: TimerKind, text: &str) -> Result<ExecutableTimer, String> {
    let timer = match kind {
        TimerKind::Cycle => ExecutableTimer::Cycle(
            text.parse::<RepeatingInterval>()
                .map_err(|e| e.to_string())?,
        ),
        TimerKind::Duration => {
            ExecutableTimer::Duration(parse_duration(text).map_err(|e| e.to_string())?)
        }
        TimerKind::Date => ExecutableTimer::Date(parse_date(text).map_err(|e| e.to_string())?),
    };
    Ok(timer)
}

/* ===================== Element Transformers ===================== */

/// Binds type-specific behaviour to an instantiated element
pub trait ElementTransformer: Send + Sync {
    fn applies_to(&self, node: &FlowNode) -> bool;

    /// `scope` is the id of the enclosing sub-process, if any
    fn transform(
        &self,
        node: &FlowNode,
        scope: Option<&str>,
        context: &mut TransformContext<'_>,
    ) -> Result<(), TransformError>;
}

/* ===================== Workflow Transformer ===================== */

pub struct WorkflowTransformer {
    expression_language: Arc<dyn ExpressionLanguage>,
    validator: Validator,
    transformers: Vec<Box<dyn ElementTransformer>>,
}

impl WorkflowTransformer {
    pub fn new(expression_language: Arc<dyn ExpressionLanguage>) -> Self {
        Self {
            expression_language,
            validator: Validator::new(),
            transformers: vec![
                Box::new(StartEventTransformer),
                Box::new(CatchEventTransformer),
            ],
        }
    }

    pub fn expression_language(&self) -> &Arc<dyn ExpressionLanguage> {
        &self.expression_language
    }

    /// Parse and validate a resource without transforming it
    pub fn validate(&self, resource: &[u8]) -> Result<Definitions, TransformError> {
        let definitions = Definitions::from_json(resource)?;

        let errors: Vec<_> = definitions
            .executable_processes()
            .flat_map(|process| {
                self.validator
                    .validate(process, self.expression_language.as_ref())
            })
            .collect();

        if !errors.is_empty() {
            return Err(TransformError::Validation(errors));
        }
        if definitions.executable_processes().next().is_none() {
            return Err(TransformError::NoExecutableProcess);
        }

        Ok(definitions)
    }

    /// Validate a resource and build one executable workflow per executable process
    pub fn transform(&self, resource: &[u8]) -> Result<Vec<ExecutableWorkflow>, TransformError> {
        let definitions = self.validate(resource)?;

        definitions
            .executable_processes()
            .map(|process| self.transform_process(process))
            .collect()
    }

    fn transform_process(&self, process: &Process) -> Result<ExecutableWorkflow, TransformError> {
        let mut context = TransformContext::new(&process.id, self.expression_language.as_ref());

        let mut nodes = Vec::new();
        walk(&process.elements, None, &mut nodes);

        for (node, scope) in &nodes {
            flow_node::instantiate(node, *scope, &mut context);
        }

        sequence_flow::transform(&process.sequence_flows, None, &mut context)?;
        for (node, _) in &nodes {
            if let FlowNodeKind::SubProcess(sub) = &node.kind {
                sequence_flow::transform(&sub.sequence_flows, Some(&node.id), &mut context)?;
            }
        }

        for (node, scope) in &nodes {
            for transformer in self.transformers.iter().filter(|t| t.applies_to(node)) {
                transformer.transform(node, *scope, &mut context)?;
            }
        }

        debug!(
            bpmn_process_id = %process.id,
            elements = nodes.len(),
            "Transformed workflow"
        );

        Ok(context.workflow)
    }
}

/// Flatten the element tree into `(node, enclosing sub-process)` pairs
fn walk<'p>(
    elements: &'p [FlowNode],
    scope: Option<&'p str>,
    out: &mut Vec<(&'p FlowNode, Option<&'p str>)>,
) {
    for element in elements {
        out.push((element, scope));
        if let FlowNodeKind::SubProcess(sub) = &element.kind {
            walk(&sub.elements, Some(&element.id), out);
        }
    }
}
