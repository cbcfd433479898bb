//! Property tests for in-memory vector store search ordering, bounds and filtering.

use std::collections::HashMap;

use rag_core::{InMemoryVectorStore, RagDocument, SearchRequest, VectorStore};
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a tagged document with a normalized embedding.
fn arb_entry(dim: usize) -> impl Strategy<Value = (RagDocument, Vec<f32>)> {
    (
        "[a-z]{3,8}",
        "[a-z ]{5,30}",
        prop_oneof![Just("en"), Just("fr")],
        arb_normalized_embedding(dim),
    )
        .prop_map(|(id, text, lang, embedding)| {
            (RagDocument::with_id(id, text).with_metadata("lang", lang), embedding)
        })
}

/// *For any* set of documents stored in an InMemoryVectorStore, searching
/// SHALL return results ordered by descending score, at most `top_k` of them,
/// each scoring at least the threshold and matching every filter.
mod prop_inmemory_search_contract {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_filtered_and_bounded(
            entries in proptest::collection::vec(arb_entry(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
            threshold in 0.0f32..1.0f32,
            filter_lang in proptest::option::of(prop_oneof![Just("en"), Just("fr")]),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, eligible) = rt.block_on(async {
                let store = InMemoryVectorStore::new();

                // Deduplicate by id to avoid add overwriting
                let mut deduped: HashMap<String, (RagDocument, Vec<f32>)> = HashMap::new();
                for (doc, embedding) in &entries {
                    deduped
                        .entry(doc.id().to_string())
                        .or_insert_with(|| (doc.clone(), embedding.clone()));
                }
                let (docs, vectors): (Vec<_>, Vec<_>) = deduped.into_values().unzip();
                store.add(&docs, &vectors).await.unwrap();

                let mut builder =
                    SearchRequest::builder("q").top_k(top_k).similarity_threshold(threshold);
                if let Some(lang) = filter_lang {
                    builder = builder.filter("lang", lang);
                }
                let request = builder.build().unwrap();
                let eligible = docs.iter().filter(|d| request.matches(d)).count();
                let results = store.similarity_search(&request, &query).await.unwrap();
                (results, eligible)
            });

            prop_assert!(results.len() <= top_k);
            prop_assert!(results.len() <= eligible);

            for doc in &results {
                let score = doc.score().expect("search results carry a score");
                if threshold > 0.0 {
                    prop_assert!(score >= threshold);
                }
                if let Some(lang) = filter_lang {
                    prop_assert_eq!(doc.metadata().get("lang"), Some(&serde_json::json!(lang)));
                }
            }

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score() >= window[1].score(),
                    "results not in descending order: {:?} < {:?}",
                    window[0].score(),
                    window[1].score(),
                );
            }
        }
    }
}
