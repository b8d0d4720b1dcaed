//! Prompt builders for the explanation generator.

use menu_common::DisplayLanguage;

/// Prompt for a single dish explanation in the requested display language.
///
/// The model must first decide whether the input is food at all; non-food
/// submissions get the fixed sentinel shape so the caller never has to
/// special-case them.
pub fn explanation_prompt(dish_name: &str, language: DisplayLanguage) -> String {
    format!(
        r#"You are a culinary expert helping diners understand restaurant menus.

Input dish name (as printed on the menu): "{dish_name}"

First decide whether this is actually a food or drink item. Respond with a
single JSON object and nothing else.

If it is NOT a food or drink item, respond exactly with:
{{
  "explanation": "{not_food_explanation}",
  "tags": [],
  "allergens": [],
  "cuisine": "{not_food_cuisine}"
}}

If it IS a food or drink item, respond with:
{{
  "explanation": "<plain-language description of the dish, at most 300 characters, written in {language_name}>",
  "tags": ["<dietary, flavor or cooking-method labels such as Vegetarian, Spicy, Grilled, written in {language_name}>"],
  "allergens": ["<each entry formatted as the {language_name} equivalent of 'Contains X'>"],
  "cuisine": "<specific cuisine classification, written in {language_name}>"
}}

Rules:
- All text fields must be written in {language_name}.
- Do not wrap the JSON in markdown fences.
- Use an empty array when no tags or allergens apply."#,
        dish_name = dish_name,
        language_name = language.name(),
        not_food_explanation = language.not_food_explanation(),
        not_food_cuisine = language.not_food_cuisine(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_dish_and_language() {
        let prompt = explanation_prompt("Spaghetti Carbonara", DisplayLanguage::Fr);
        assert!(prompt.contains("\"Spaghetti Carbonara\""));
        assert!(prompt.contains("French"));
        assert!(prompt.contains("Non applicable"));
    }

    #[test]
    fn sentinels_follow_display_language() {
        let prompt = explanation_prompt("Chair", DisplayLanguage::Es);
        assert!(prompt.contains("No aplicable"));
        assert!(prompt.contains("Esto no parece ser un alimento."));
    }
}
