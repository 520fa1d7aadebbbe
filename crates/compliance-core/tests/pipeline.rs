//! End-to-end pipeline tests over real extraction and chunking with
//! stubbed providers.

use compliance_core::pipeline::GenerateRequest;
use compliance_core::rules::RuleRepository;
use compliance_core::testing::{StubLlm, StubVectors};
use compliance_core::{
    ComplianceError, Config, ContentPipeline, MemoryAuditSink, MemoryRuleRepository,
    MemorySubmissionRepository, RuleService,
};
use compliance_types::{
    ComplianceStatus, InputType, Rule, RuleCategory, RuleRef, RuleSeverity, TriggeredStatus,
};
use std::sync::Arc;
use uuid::Uuid;

/// Build a PDF with one text line per page.
fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => Object::Reference(font_id) },
    });

    let mut kids = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content stream"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
            "Resources" => Object::Reference(resources_id),
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        lopdf::Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("serialize pdf");
    buffer
}

fn prohibitive_rule() -> Rule {
    Rule::new(
        "Marketing copy must not promise guaranteed returns".to_string(),
        RuleCategory::Regulatory,
        RuleSeverity::High,
        Uuid::new_v4(),
    )
}

async fn pipeline_with_rules(rules: Vec<Rule>, reviewer: StubLlm) -> ContentPipeline {
    let repo = Arc::new(MemoryRuleRepository::new());
    for rule in rules {
        repo.insert(rule).await.unwrap();
    }
    ContentPipeline::new(
        repo,
        Arc::new(MemorySubmissionRepository::new()),
        Arc::new(StubLlm::failing().with_generation("generated copy")),
        Arc::new(reviewer),
        Arc::new(StubVectors::unavailable()),
        Arc::new(MemoryAuditSink::new()),
        &Config::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn pdf_document_check_flags_violation_with_reviewer_down() {
    let rule = prohibitive_rule();
    let pipeline = pipeline_with_rules(vec![rule.clone()], StubLlm::failing()).await;

    let pdf = pdf_with_pages(&[
        "Our equity fund invests across large-cap stocks.",
        "This plan offers guaranteed returns of 12 percent.",
    ]);

    let outcome = pipeline
        .check_document(&pdf, "fund-brochure.pdf", Uuid::new_v4())
        .await
        .unwrap();

    let submission = &outcome.submission;
    assert_eq!(submission.compliance_status, ComplianceStatus::Violations);
    assert_eq!(submission.input_type, InputType::Document);
    assert_eq!(submission.rules_triggered.len(), 1);

    let hit = &submission.rules_triggered[0];
    assert_eq!(hit.rule_id, RuleRef::Stored(rule.rule_id));
    assert_eq!(hit.status, TriggeredStatus::Violated);
    assert!(hit.explanation.as_deref().unwrap().contains("page"));

    // Per-chunk detail rides along with the submission.
    assert_eq!(outcome.chunk_reviews.len(), 1);
    let review = &outcome.chunk_reviews[0];
    assert!(review.chunk_text.contains("guaranteed returns"));
    assert_eq!(review.page, Some(1));
    assert!(review.section.as_deref().unwrap().starts_with("[PAGE"));
    assert_eq!(review.violations.len(), 1);

    // The stored excerpt keeps the extracted text with page markers.
    assert!(submission.final_content.contains("[PAGE 1]"));
    assert!(submission.final_content.contains("guaranteed returns"));
}

#[tokio::test]
async fn clean_pdf_comes_back_compliant() {
    let pipeline = pipeline_with_rules(
        vec![prohibitive_rule()],
        StubLlm::failing().with_structured(serde_json::json!({ "compliance_issues": [] })),
    )
    .await;

    let pdf = pdf_with_pages(&["Past performance does not predict future results."]);
    let outcome = pipeline
        .check_document(&pdf, "disclaimer.pdf", Uuid::new_v4())
        .await
        .unwrap();

    assert_eq!(
        outcome.submission.compliance_status,
        ComplianceStatus::Compliant
    );
    assert!(outcome.submission.rules_triggered.is_empty());
    assert!(outcome.chunk_reviews.is_empty());
}

#[tokio::test]
async fn generation_and_document_flows_share_the_rule_scope() {
    // A rule deactivated between the two calls stops applying.
    let rule = prohibitive_rule();
    let repo = Arc::new(MemoryRuleRepository::new());
    repo.insert(rule.clone()).await.unwrap();

    let pipeline = ContentPipeline::new(
        repo.clone(),
        Arc::new(MemorySubmissionRepository::new()),
        Arc::new(StubLlm::failing().with_generation("Totally guaranteed returns!")),
        Arc::new(StubLlm::failing()),
        Arc::new(StubVectors::unavailable()),
        Arc::new(MemoryAuditSink::new()),
        &Config::default(),
    )
    .unwrap();

    let flagged = pipeline
        .generate_content(GenerateRequest {
            prompt: "fund blurb".to_string(),
            user_id: Uuid::new_v4(),
            enhance_prompt: false,
        })
        .await
        .unwrap();
    assert_eq!(
        flagged.submission.compliance_status,
        ComplianceStatus::Violations
    );

    repo.set_active(rule.rule_id, false).await.unwrap();

    let clean = pipeline
        .generate_content(GenerateRequest {
            prompt: "fund blurb".to_string(),
            user_id: Uuid::new_v4(),
            enhance_prompt: false,
        })
        .await
        .unwrap();
    assert_eq!(
        clean.submission.compliance_status,
        ComplianceStatus::Compliant
    );
}

#[tokio::test]
async fn rule_update_chain_versions_and_single_active_row() {
    let repo = Arc::new(MemoryRuleRepository::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let service = RuleService::new(
        repo.clone(),
        Arc::new(StubLlm::failing()),
        Arc::new(StubVectors::unavailable()),
        audit,
    );

    let admin = Uuid::new_v4();
    let v1 = service
        .create_rule(
            "No superlatives in headlines".to_string(),
            RuleCategory::Brand,
            RuleSeverity::Medium,
            admin,
        )
        .await
        .unwrap();

    let v2 = service
        .update_rule(v1.rule_id, admin, None, None, Some(RuleSeverity::High))
        .await
        .unwrap();
    let v3 = service
        .update_rule(v2.rule_id, admin, None, None, Some(RuleSeverity::Low))
        .await
        .unwrap();

    assert_eq!(v2.version, 2);
    assert_eq!(v3.version, 3);

    let all = service.get_all_rules().await.unwrap();
    assert_eq!(all.len(), 3);
    let active = service.get_active_rules().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].rule_id, v3.rule_id);
}

#[tokio::test]
async fn unsupported_upload_is_rejected_before_any_review() {
    let pipeline = pipeline_with_rules(vec![], StubLlm::failing()).await;
    let err = pipeline
        .check_document(b"col1,col2", "sheet.csv", Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ComplianceError::UnsupportedFormat { .. }));
}
