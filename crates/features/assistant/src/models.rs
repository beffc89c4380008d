use shortly_derive::api_model;

#[api_model]
pub struct Question {
    pub question: String,
}

#[api_model]
pub struct Answer {
    pub question: String,
    pub answer: String,
}
