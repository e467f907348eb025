use crate::models::AvatarRequest;

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() { default } else { value }
}

/// Builds the text-to-image prompt for a request.
///
/// Empty fields fall back to stock phrases, so a fully empty request still yields a usable prompt.
/// "an {face_shape}" and "{nationality} nationality" are kept as the form has always produced them,
/// even where that reads "an round" or "unknown nationality nationality".
pub fn build_prompt(request: &AvatarRequest) -> String {
    let subject = if request.gender.is_empty() {
        "person".to_string()
    } else {
        format!("{} person", request.gender)
    };
    format!(
        "A personalized avatar of a {subject} with {hair} hair, {eyes} eyes, an {face_shape} face shape, aged around {age}, of {nationality} nationality, working as a {occupation}, dressed in {dress}, and categorized as a {customer_type} customer.",
        hair = or_default(&request.hair, "short black"),
        eyes = or_default(&request.eyes, "brown"),
        face_shape = or_default(&request.face_shape, "oval"),
        age = or_default(&request.age, "30"),
        nationality = or_default(&request.nationality, "unknown nationality"),
        occupation = or_default(&request.occupation, "professional"),
        dress = or_default(&request.dress, "professional attire"),
        customer_type = or_default(&request.customer_type, "regular"),
    )
}
