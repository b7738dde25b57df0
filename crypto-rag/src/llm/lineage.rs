use serde::Serialize;

/// One hop of data through a retrieval: what was read, from where, into what
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineageEdge {
    pub operation: &'static str,
    pub source: String,
    pub target: String,
    pub records: usize,
}

/// Ordered lineage of a single query. Every recorded edge is also emitted
/// as a tracing event under the `lineage` target.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineageTrail {
    edges: Vec<LineageEdge>,
}

impl LineageTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        operation: &'static str,
        source: impl Into<String>,
        target: impl Into<String>,
        records: usize,
    ) {
        let edge = LineageEdge {
            operation,
            source: source.into(),
            target: target.into(),
            records,
        };

        tracing::debug!(
            target: "lineage",
            operation = edge.operation,
            source = %edge.source,
            target_node = %edge.target,
            records = edge.records,
            "lineage edge"
        );

        self.edges.push(edge);
    }

    pub fn edges(&self) -> &[LineageEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trail_keeps_order() {
        let mut trail = LineageTrail::new();
        trail.record("market_lookup", "market_records", "BTC", 1);
        trail.record("vector_search", "discussion_posts", "retrieval_result", 3);

        let ops: Vec<_> = trail.edges().iter().map(|e| e.operation).collect();
        assert_eq!(ops, vec!["market_lookup", "vector_search"]);
        assert_eq!(trail.edges()[1].records, 3);
    }
}
