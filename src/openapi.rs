// src/openapi.rs

use utoipa::OpenApi;

use crate::{
    handlers::{certificates, questions, responses},
    models::{
        certificate::{CertificateView, UploadCertificatesForm, UploadedCertificates},
        question::{
            FileFormat, FileProperties, QuestionList, QuestionOption, QuestionType, QuestionView,
            SizeUnit,
        },
        response::{ResponseForm, ResponsePage, ResponseView},
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Questions
        questions::list_questions,
        questions::get_question,
        // Responses
        responses::list_responses,
        responses::create_response,
        responses::get_response,
        responses::update_response,
        responses::partial_update_response,
        responses::delete_response,
        // Certificates
        certificates::upload_certificates,
        certificates::download_certificate,
        certificates::download_certificates,
    ),
    components(schemas(
        QuestionType,
        FileFormat,
        SizeUnit,
        QuestionOption,
        FileProperties,
        QuestionView,
        QuestionList,
        CertificateView,
        ResponseView,
        ResponsePage,
        ResponseForm,
        UploadCertificatesForm,
        UploadedCertificates,
    )),
    tags(
        (name = "questions", description = "Survey questions (read-only)"),
        (name = "responses", description = "Respondent submissions"),
        (name = "certificates", description = "PDF certificate upload and download"),
    ),
    info(
        title = "Survey API",
        version = "0.1.0",
        description = "Survey questions, responses and certificate downloads",
    )
)]
pub struct ApiDoc;
