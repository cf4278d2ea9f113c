//! The ready-made flows shipped with the CLI.

use serde_json::{json, Value};

use super::decisions::{Condition, DecisionTable, Rule};
use super::document::{DocClass, ExtractionField, FieldType};
use super::user::{Assignment, FieldKind, UserField, UserFlow};
use super::{BranchCondition, Flow, FlowBuilder, FlowError, Node, NodeKind, END, START};

const VISION_LLM: &str = "watsonx/meta-llama/llama-3-2-90b-vision-instruct";

pub const FLOW_NAMES: &[&str] = &[
    "get_insurance_rate",
    "custom_flow_docclassifier_example",
    "custom_flow_docext_example",
    "document_processing_flow",
    "text_extraction_flow_example",
    "user_flow_example",
    "user_flow_example_no_files",
];

pub fn by_name(name: &str) -> Option<Result<Flow, FlowError>> {
    let flow = match name {
        "get_insurance_rate" => get_insurance_rate(),
        "custom_flow_docclassifier_example" => doc_classifier_example(),
        "custom_flow_docext_example" => doc_extractor_example(),
        "document_processing_flow" => document_processing_flow(),
        "text_extraction_flow_example" => text_extraction_example(),
        "user_flow_example" => user_flow_example(),
        "user_flow_example_no_files" => user_flow_example_no_files(),
        _ => return None,
    };
    Some(flow)
}

pub fn all() -> Result<Vec<Flow>, FlowError> {
    FLOW_NAMES
        .iter()
        .filter_map(|name| by_name(name))
        .collect()
}

fn document_input() -> Value {
    json!({
        "type": "object",
        "properties": {
            "document_ref": {
                "type": "string",
                "format": "binary",
                "description": "Reference to the document to process"
            },
            "language": {"type": "string", "default": "en"}
        },
        "required": ["document_ref"]
    })
}

fn contract_fields() -> Vec<ExtractionField> {
    vec![
        ExtractionField::new("Buyer", "buyer"),
        ExtractionField::new("Seller", "seller"),
        ExtractionField::new("Agreement Date", "agreement_date").with_type(FieldType::Date),
    ]
}

/// Insurance rate by credit grade and loan amount, as a decision table
pub fn get_insurance_rate() -> Result<Flow, FlowError> {
    // The eighth rule (0.0075 at 600000 and above) belongs to grade B. As a
    // second grade A rule it could never fire, since A already covers that band.
    let bands: [(&str, [Option<f64>; 4]); 2] = [
        ("A", [None, Some(0.001), Some(0.003), Some(0.005)]),
        ("B", [None, Some(0.0025), Some(0.005), Some(0.0075)]),
    ];

    let mut rules = Vec::new();
    for (grade, rates) in bands {
        let amounts = [
            Condition::less_than(100_000.0),
            Condition::in_range(100_000.0, 300_000.0, true, false),
            Condition::in_range(300_000.0, 600_000.0, true, false),
            Condition::greater_than_or_equal(600_000.0),
        ];
        for (amount, rate) in amounts.into_iter().zip(rates) {
            let rule = Rule::new()
                .condition("grade", Condition::equal(grade))
                .condition("loan_amount", amount);
            rules.push(match rate {
                Some(rate) => rule
                    .action("insurance_required", true)
                    .action("insurance_rate", rate),
                None => rule.action("insurance_required", false),
            });
        }
    }

    let input = json!({
        "type": "object",
        "properties": {
            "loan_amount": {"type": "number"},
            "grade": {"type": "string", "enum": ["A", "B"]}
        },
        "required": ["loan_amount", "grade"]
    });
    let output = json!({
        "type": "object",
        "properties": {
            "insurance_required": {"type": "boolean", "default": false},
            "insurance_rate": {"type": "number", "default": 0.0},
            "assessment_error": {"type": ["string", "null"], "default": null}
        }
    });

    let table = DecisionTable::new(rules)
        .with_default("assessment_error", "Not assessed. Incorrect data submitted.");

    FlowBuilder::new("get_insurance_rate")
        .description("Calculates the insurance rate based on provided information.")
        .input_schema(input.clone())
        .output_schema(output.clone())
        .node(
            Node::new("assess_insurance_rate", NodeKind::Decisions(table))
                .with_display_name("Assess insurance rate.")
                .with_description("Based on credit rate and loan amount, assess insurance rate.")
                .with_input_schema(input)
                .with_output_schema(output),
        )
        .sequence(&[START, "assess_insurance_rate", END])
        .build()
}

pub fn doc_classifier_example() -> Result<Flow, FlowError> {
    FlowBuilder::new("custom_flow_docclassifier_example")
        .display_name("custom_flow_docclassifier_example")
        .description("Classifies documents into custom classes.")
        .input_schema(document_input())
        .node(
            Node::doc_classifier(
                "document_classifier_node",
                VISION_LLM,
                vec![DocClass::new("Invoice")],
            )
            .with_display_name("document_classifier_node")
            .with_description("Classifies documents into one custom class."),
        )
        .sequence(&[START, "document_classifier_node", END])
        .build()
}

pub fn doc_extractor_example() -> Result<Flow, FlowError> {
    FlowBuilder::new("custom_flow_docext_example")
        .display_name("custom_flow_docext_example")
        .description("Extraction of custom fields from a document, specified by the user.")
        .input_schema(document_input())
        .node(
            Node::doc_extractor("contract_extractor", VISION_LLM, contract_fields(), true)
                .with_display_name("Extract fields from a contract")
                .with_description("Extracts fields from an input contract file"),
        )
        .sequence(&[START, "contract_extractor", END])
        .build()
}

/// Classify a document, then pick an extraction path by its class
pub fn document_processing_flow() -> Result<Flow, FlowError> {
    let classes = [
        "invoice",
        "bill_of_lading",
        "contract",
        "purchase_order",
        "utility_bill",
        "tax_form",
    ]
    .into_iter()
    .map(DocClass::new)
    .collect();

    let class_in = |names: &str| {
        format!(
            "flow.document_classifier_node.output.class_name.strip().lower() in [{}]",
            names
        )
    };
    let text_extraction = |name: &str, schema_tool: &str| {
        Node::text_extraction(name, Some(format!("kvp_schemas=flow.{}.output", schema_tool)))
            .with_display_name("text_extraction_node")
            .with_description("Extracts the raw text and semantic structure from a document.")
    };
    let schema_list = json!({"type": "array", "items": {"type": "object"}});

    FlowBuilder::new("document_processing_flow")
        .display_name("document_processing_flow")
        .description("Process documents")
        .input_schema(document_input())
        .node(Node::tool("get_kvp_schemas_for_invoice").with_output_schema(schema_list.clone()))
        .node(Node::tool("get_kvp_schemas_for_utility_bill").with_output_schema(schema_list))
        .node(
            Node::doc_extractor("doc_ext_node", VISION_LLM, contract_fields(), true)
                .with_display_name("doc_ext_node")
                .with_description(
                    "Extracts custom field values (key-value-pairs) from a document using different extraction schemas.",
                ),
        )
        .node(
            Node::doc_classifier("document_classifier_node", VISION_LLM, classes)
                .with_display_name("document_classifier_node")
                .with_description("Classifies documents into a custom class."),
        )
        .node(text_extraction(
            "text_extraction_with_document_structure_for_invoice",
            "get_kvp_schemas_for_invoice",
        ))
        .node(text_extraction(
            "text_extraction_with_document_structure_for_utility_bill",
            "get_kvp_schemas_for_utility_bill",
        ))
        .node(Node::branch(
            "document_kind",
            vec![
                BranchCondition::when(
                    class_in("'invoice','bill_of_lading'"),
                    "get_kvp_schemas_for_invoice",
                ),
                BranchCondition::when(class_in("'utility_bill'"), "get_kvp_schemas_for_utility_bill"),
                BranchCondition::when(class_in("'contract','purchase_order'"), "doc_ext_node"),
                BranchCondition::otherwise("doc_ext_node"),
            ],
        ))
        .sequence(&[START, "document_classifier_node", "document_kind"])
        .edge(
            "get_kvp_schemas_for_invoice",
            "text_extraction_with_document_structure_for_invoice",
        )
        .edge(
            "get_kvp_schemas_for_utility_bill",
            "text_extraction_with_document_structure_for_utility_bill",
        )
        .edge("text_extraction_with_document_structure_for_utility_bill", END)
        .edge("text_extraction_with_document_structure_for_invoice", END)
        .edge("doc_ext_node", END)
        .build()
}

pub fn text_extraction_example() -> Result<Flow, FlowError> {
    FlowBuilder::new("text_extraction_flow_example")
        .display_name("text_extraction_flow_example")
        .description(
            "This flow consists of one node: a docproc node, which extracts text from the input document",
        )
        .input_schema(document_input())
        .node(
            Node::text_extraction("text_extraction_with_document_structure", None)
                .with_display_name("text_extraction_node")
                .with_description("Extract text out of a document's contents."),
        )
        .sequence(&[START, "text_extraction_with_document_structure", END])
        .build()
}

fn survey_input() -> Value {
    json!({
        "type": "object",
        "properties": {
            "first_name": {"type": "string", "default": "", "description": "Your first name"}
        }
    })
}

fn survey_output() -> Value {
    json!({
        "type": "object",
        "properties": {
            "last_name": {"type": "string", "description": "Last name from user input"},
            "age": {"type": "integer", "description": "Age from user input"}
        },
        "required": ["last_name", "age"]
    })
}

fn plan_options(display_name: &str) -> UserField {
    UserField::output(
        "subscription_options",
        display_name,
        FieldKind::List,
        "Based on your profile, here are our recommended plans:",
    )
    .with_assignment(Assignment::new(
        "self.input.value",
        r#"["Option A: Basic Plan", "Option B: Standard Plan", "Option C: Premium Plan"]"#,
    ))
}

fn survey_flow(name: &str, display_name: &str, description: &str, form: UserFlow) -> Result<Flow, FlowError> {
    FlowBuilder::new(name)
        .display_name(display_name)
        .description(description)
        .input_schema(survey_input())
        .output_schema(survey_output())
        .node(Node::new("userflow_1", NodeKind::UserFlow(form.sequential())))
        .sequence(&[START, "userflow_1", END])
        .build()
}

pub fn user_flow_example() -> Result<Flow, FlowError> {
    let form = UserFlow::new()
        .field(UserField::output(
            "welcome",
            "Welcome",
            FieldKind::Text,
            "Hello {flow.input.first_name}! Welcome to the user survey demo. Let's collect some information.",
        ))
        .field(UserField::input(
            "upload",
            "Upload Document (Optional)",
            FieldKind::File,
            "Please upload a document (PDF, DOC, etc.) if you have one.",
        ))
        .field(UserField::output(
            "file_status",
            "Upload Status",
            FieldKind::Text,
            "✓ Thank you for uploading your document.",
        ))
        .field(
            UserField::output(
                "download",
                "Download Processed File",
                FieldKind::File,
                "Here's your processed document:",
            )
            .with_assignment(Assignment::new(
                "self.input.value",
                r#"flow["userflow_1"]["Upload Document (Optional)"].output.value"#,
            )),
        )
        .field(UserField::input(
            "last_name",
            "Last Name",
            FieldKind::Text,
            "Please enter your last name:",
        ))
        .field(UserField::input("age", "Age", FieldKind::Number, "How old are you?"))
        .field(plan_options("Available Plans"));

    survey_flow(
        "user_flow_example",
        "User Survey Form",
        "A simple user survey flow that demonstrates various user interaction features.",
        form,
    )
}

pub fn user_flow_example_no_files() -> Result<Flow, FlowError> {
    let form = UserFlow::new()
        .field(UserField::output(
            "welcome",
            "Welcome",
            FieldKind::Text,
            "Hello {flow.input.first_name}! Welcome to our quick survey. Please answer a few questions.",
        ))
        .field(UserField::input(
            "last_name",
            "Last Name",
            FieldKind::Text,
            "What's your last name?",
        ))
        .field(UserField::input("age", "Age", FieldKind::Number, "How old are you?"))
        .field(plan_options("Recommended Plans"))
        .field(UserField::output(
            "thank_you",
            "Thank You",
            FieldKind::Text,
            "✓ Thank you for completing our survey, {flow.input.first_name}! Your information has been saved.",
        ));

    survey_flow(
        "user_flow_example_no_files",
        "Quick User Survey",
        "A simple user survey flow that demonstrates text, number input, and list display features.",
        form,
    )
}
