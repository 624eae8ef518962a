use super::forms::{LoginForm, RegistrationForm};
use crate::forms::FormErrors;
use crate::web::pages::{escape_attr, render_input, render_non_field_errors};

pub fn render_login_form(form: &LoginForm, errors: &FormErrors) -> String {
    let next = if form.next.is_empty() {
        String::new()
    } else {
        format!(
            "<input type=\"hidden\" name=\"next\" value=\"{}\">",
            escape_attr(&form.next)
        )
    };

    format!(
        "<h2>Log in</h2>\
        <form method=\"post\" action=\"/login/\" class=\"login-form\">\
            {non_field}\
            {username}\
            {password}\
            {next}\
            <button type=\"submit\">Log in</button>\
        </form>\
        <p>No account yet? <a href=\"/register/\">Register</a></p>",
        non_field = render_non_field_errors(errors),
        username = render_input("username", "Username", "text", &form.username, errors),
        password = render_input("password", "Password", "password", "", errors),
        next = next,
    )
}

/// Password fields are never echoed back.
pub fn render_registration_form(form: &RegistrationForm, errors: &FormErrors) -> String {
    format!(
        "<h2>Register</h2>\
        <form method=\"post\" action=\"/register/\" class=\"register-form\">\
            {non_field}\
            {username}\
            {email}\
            {first_name}\
            {last_name}\
            {password1}\
            {password2}\
            <button type=\"submit\">Register</button>\
        </form>\
        <p>Already registered? <a href=\"/login/\">Log in</a></p>",
        non_field = render_non_field_errors(errors),
        username = render_input("username", "Username", "text", &form.username, errors),
        email = render_input("email", "Email address", "email", &form.email, errors),
        first_name = render_input("first_name", "First name", "text", &form.first_name, errors),
        last_name = render_input("last_name", "Last name", "text", &form.last_name, errors),
        password1 = render_input("password1", "Password", "password", "", errors),
        password2 = render_input("password2", "Password confirmation", "password", "", errors),
    )
}
