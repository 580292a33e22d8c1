//! Snapshot tests for answer assembly

#[cfg(test)]
mod snapshot_tests {
    use crate::testing::{CountingEmbedder, ScriptedGenerator, StaticIndex, passages};
    use crate::{AnswerAssembler, AssemblerConfig, ContextFragment, HashEmbedder, LocalVectorStore};
    use crate::{DocumentIndexer, Document, SimilarityIndex};
    use insta::{assert_snapshot, assert_yaml_snapshot};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_ros2_scenario_sources_snapshot() {
        let generator = Arc::new(ScriptedGenerator::answering("ROS 2 is a robotics middleware."));
        let index = Arc::new(StaticIndex::with(passages(&[0.91, 0.85, 0.80])));
        let assembler =
            AnswerAssembler::new(generator).with_retrieval(Arc::new(CountingEmbedder::new(8)), index);

        let answer = assembler.answer_question("What is ROS 2?", None).await.unwrap();

        assert_yaml_snapshot!(answer.sources, {
            "[].score" => insta::rounded_redaction(2),
        }, @r###"
        - text: passage 0
          source: chapter-0.md
          score: 0.91
        - text: passage 1
          source: chapter-1.md
          score: 0.85
        - text: passage 2
          source: chapter-2.md
          score: 0.8
        "###);
    }

    #[tokio::test]
    async fn test_selected_text_sources_snapshot() {
        let generator = Arc::new(ScriptedGenerator::answering("It runs computation."));
        let assembler = AnswerAssembler::new(generator);

        let answer = assembler
            .answer_question("Explain this", Some("A node is a process that performs computation."))
            .await
            .unwrap();

        assert_yaml_snapshot!(answer.sources, @r###"
        - text: A node is a process that performs computation.
          source: Selected Text
        "###);
    }

    #[test]
    fn test_composed_prompt_snapshot() {
        let assembler = AnswerAssembler::new(Arc::new(ScriptedGenerator::answering("ok")));
        let fragments = vec![
            ContextFragment::retrieved("Topics carry messages between nodes.", "ros2.md", 0.9),
            ContextFragment::retrieved("Services are request/response calls.", "ros2.md", 0.7),
        ];

        let prompt = assembler.compose_prompt("How do nodes talk?", &fragments);

        assert_eq!(prompt.system, "You are a helpful robotics and AI assistant.");
        assert_snapshot!(prompt.user_content(), @r###"
        You are a helpful assistant for a Physical AI & Humanoid Robotics textbook.

        Context:
        Topics carry messages between nodes.

        Services are request/response calls.

        User Question: How do nodes talk?

        Provide a clear, accurate answer based on the context.
        "###);
    }

    #[tokio::test]
    async fn test_end_to_end_with_local_index() {
        let embedder = Arc::new(HashEmbedder::new(128));
        let store = Arc::new(LocalVectorStore::new());
        store.initialize(128).await.unwrap();

        let indexer = DocumentIndexer::new(embedder.clone(), store.clone());
        let result = indexer
            .index_documents(vec![
                Document {
                    title: "ROS 2 Nodes".into(),
                    source: "ros2.md".into(),
                    content: "ROS 2 nodes communicate over topics using publishers and subscribers.".into(),
                },
                Document {
                    title: "Bipedal Balance".into(),
                    source: "balance.md".into(),
                    content: "Humanoid balance control tracks the zero moment point.".into(),
                },
            ])
            .await;
        assert_eq!(result.documents_indexed, 2);

        let generator = Arc::new(ScriptedGenerator::answering("Through topics."));
        let assembler = AnswerAssembler::new(generator.clone())
            .with_retrieval(embedder, store)
            .with_config(AssemblerConfig {
                top_k: 1,
                ..Default::default()
            });

        let answer = assembler
            .answer_question("how do ros 2 nodes communicate over topics", None)
            .await
            .unwrap();

        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].source_label, "ROS 2 Nodes");
        assert!(generator.last_prompt().contains("publishers and subscribers"));
    }
}
