//! Scripted community recommendation

use serde::{Deserialize, Serialize};

/// Structured description of a single scripted option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub name: String,
    pub description: String,
    pub amenities: Vec<String>,
    pub care_types: Vec<String>,
    pub locations: Vec<String>,
}

impl Recommendation {
    /// The one community the recommendation branch offers
    pub fn grand_villa() -> Self {
        Self {
            name: "Grand Villa".to_string(),
            description: "Grand Villa is a premier senior living community offering independent \
                living, assisted living, and memory care services. We provide a luxurious \
                lifestyle with resort-style amenities, chef-prepared meals, and engaging \
                activities."
                .to_string(),
            amenities: to_strings(&[
                "Resort-style swimming pool",
                "Fitness center",
                "Beauty salon and barbershop",
                "Restaurant-style dining",
                "Engaging activities and events",
                "24/7 care and support",
            ]),
            care_types: to_strings(&["Independent Living", "Assisted Living", "Memory Care"]),
            locations: to_strings(&["Florida", "Georgia", "Alabama"]),
        }
    }

    /// Render the fixed assistant reply for this recommendation
    pub fn message(&self) -> String {
        format!(
            "I'd like to tell you about {name}, a premier senior living community. {description}\n\n\
             Key amenities include:\n{amenities}\n\n\
             Would you like to know more about {name} or would you prefer to explore other options?",
            name = self.name,
            description = self.description,
            amenities = self.amenities.join(", "),
        )
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
