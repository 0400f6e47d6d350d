use crate::complexity::ComplexityTier;
use serde::Serialize;
use std::collections::BTreeMap;

/// Demo question with a short description of what it exercises
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SampleQuery {
    pub question: &'static str,
    pub description: &'static str,
    pub tier: ComplexityTier,
}

pub const SAMPLE_QUERIES: &[SampleQuery] = &[
    SampleQuery {
        question: "How many customers do we have?",
        description: "Count all customers",
        tier: ComplexityTier::Easy,
    },
    SampleQuery {
        question: "Show me all products",
        description: "List the product catalog",
        tier: ComplexityTier::Easy,
    },
    SampleQuery {
        question: "List all customers from the USA",
        description: "Filter customers by country",
        tier: ComplexityTier::Easy,
    },
    SampleQuery {
        question: "Show me recent orders",
        description: "Latest orders by date",
        tier: ComplexityTier::Easy,
    },
    SampleQuery {
        question: "What is the average order value?",
        description: "Average of order totals",
        tier: ComplexityTier::Medium,
    },
    SampleQuery {
        question: "What is the total revenue?",
        description: "Sum of order totals",
        tier: ComplexityTier::Medium,
    },
    SampleQuery {
        question: "What are the top 10 customers by total spending?",
        description: "Customers ranked by the sum of their orders",
        tier: ComplexityTier::Medium,
    },
    SampleQuery {
        question: "Which products are selling the most?",
        description: "Products ranked by quantity sold",
        tier: ComplexityTier::Medium,
    },
    SampleQuery {
        question: "Show the number of orders per status",
        description: "Order counts grouped by status",
        tier: ComplexityTier::Medium,
    },
    SampleQuery {
        question: "Which products are priced above average?",
        description: "Products compared against the average price",
        tier: ComplexityTier::Advanced,
    },
    SampleQuery {
        question: "Find orders above the average order value",
        description: "Orders compared against the average order total",
        tier: ComplexityTier::Advanced,
    },
];

/// Sample questions grouped by tier, in catalog order within each tier
pub fn sample_catalog() -> BTreeMap<ComplexityTier, Vec<SampleQuery>> {
    let mut catalog: BTreeMap<ComplexityTier, Vec<SampleQuery>> = BTreeMap::new();
    for sample in SAMPLE_QUERIES {
        catalog.entry(sample.tier).or_default().push(*sample);
    }
    catalog
}
