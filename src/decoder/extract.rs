// src/decoder/extract.rs

use crate::common::{
    error::DecodeError,
    frame::Frame,
    types::{FieldMap, FieldTable, MetricAccumulator, PositionOrigin},
};
use alloc::string::String;

/// Counts for one frame that made it through extraction.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Extracted {
    /// Samples appended to the accumulator.
    pub samples: usize,
    /// Fields skipped because their token was not an integer.
    pub field_errors: usize,
}

/// Maps frame tokens to named samples using a [`FieldTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExtractor {
    table: FieldTable,
    origin: PositionOrigin,
}

impl FieldExtractor {
    /// Uses the table shape's default origin (see [`FieldTable::default_origin`]).
    pub fn new(table: FieldTable) -> Self {
        let origin = table.default_origin();
        FieldExtractor { table, origin }
    }

    pub fn with_origin(mut self, origin: PositionOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn table(&self) -> &FieldTable {
        &self.table
    }

    pub fn origin(&self) -> PositionOrigin {
        self.origin
    }

    /// Appends every readable field of `frame` to `acc`.
    ///
    /// Only a node-keyed table can reject the whole frame; a bad field value
    /// is logged and skipped while the rest of the frame is still read.
    pub fn extract(
        &self,
        frame: &Frame<'_>,
        acc: &mut MetricAccumulator,
    ) -> Result<Extracted, DecodeError> {
        let fields = match &self.table {
            FieldTable::Flat(fields) => fields,
            FieldTable::NodeKeyed(nodes) => {
                let node = frame.node_id().ok_or(DecodeError::MissingNodeId)?;
                nodes
                    .get(node)
                    .ok_or_else(|| DecodeError::UnknownNode(String::from(node)))?
            }
        };
        Ok(self.extract_fields(fields, frame, acc))
    }

    fn extract_fields(
        &self,
        fields: &FieldMap,
        frame: &Frame<'_>,
        acc: &mut MetricAccumulator,
    ) -> Extracted {
        let tokens = frame.tokens();
        let mut outcome = Extracted::default();

        for (metric, &position) in fields {
            // Positions past the end of a short frame are not an error
            let Some(token) = self
                .origin
                .resolve(position, frame.header_len())
                .and_then(|idx| tokens.get(idx))
            else {
                continue;
            };

            match token.parse::<i64>() {
                Ok(value) => {
                    acc.push(metric, value);
                    outcome.samples += 1;
                }
                Err(e) => {
                    tracing::warn!(metric = %metric, token = %token, error = %e, "skipping non-numeric field");
                    outcome.field_errors += 1;
                }
            }
        }
        outcome
    }
}
