use lanechart_core::ShapeType;

/// Retrieved context beyond this many characters is cut before it reaches the model.
const CONTEXT_LIMIT: usize = 3000;

pub fn system_prompt() -> &'static str {
    "You are an assistant that designs swimlane process charts for SAP implementation projects. \
Each lane is one actor, either a person, a role or a system. Each step of the process is one shape \
placed in the lane of the actor that performs it, and connectors show how the steps follow each other."
}

/// Shape types a process step may use, in the form the diagram host expects.
fn step_types() -> String {
    ShapeType::known()
        .filter(|t| !matches!(t, ShapeType::SwimLanes | ShapeType::Text))
        .map(|t| t.as_str().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ask for a structured, list-form description of the process behind the request.
pub fn structure_request(user_prompt: &str) -> String {
    format!(
        "Based on the following user request, list the objects that go into a swimlane process flow.\n\
User request: {user_prompt}\n\n\
Describe the process in list form and include:\n\
1. One swimlane for each actor in the process, whether a system or a person/role. Give the number of swimlanes.\n\
2. One shape for each step of the process. Give the number of shapes.\n\
   - each shape has a type with its usual flowchart meaning: {types}\n\
   - each shape names the swimlane it belongs to\n\
   - number the steps in the order they happen\n\
3. Line connectors between the steps. Give the number of connectors.\n\
   - each connector names its starting shape and its ending shape\n\n\
The description must be detailed enough to build the swimlane diagram from it.",
        types = step_types()
    )
}

/// The retrieved documents, replayed to the model as an assistant turn.
pub fn context_message(context: &str) -> String {
    let cut = truncate_chars(context, CONTEXT_LIMIT);
    if cut.len() < context.len() {
        format!("Here are some relevant documents: {cut}...")
    } else {
        format!("Here are some relevant documents: {cut}")
    }
}

/// Ask for the chart document itself, built from an earlier description.
pub fn diagram_request(description: &str) -> String {
    let mut out = String::with_capacity(description.len() + 1024);
    out.push_str("Create the swimlane chart document for the process below.\n\n");
    out.push_str("PROCESS:\n");
    out.push_str(description.trim());
    out.push_str("\n\nRULES:\n");
    out.push_str(
        "- Use one page with exactly one shape of type \"swimLanes\" holding one lane per actor.\n\
- Give every lane a unique id and a title. Lane widths are the lane heights in pixels.\n\
- Every other shape needs a unique id, a \"laneId\" naming one of the lanes, a bounding box and a short text.\n",
    );
    out.push_str("- Shape types must be one of: ");
    out.push_str(&step_types());
    out.push_str(".\n");
    out.push_str(
        "- Start each shape's text with its step number in brackets, e.g. \"[1] Kick-off meeting\".\n\
- Every connector joins two existing shape ids, from the earlier step to the later one.\n\
- Output only the document.",
    );
    out
}

/// Longest prefix of `text` with at most `max` characters, cut on a character boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
