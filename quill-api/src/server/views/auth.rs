use crate::server::{
    context::PageContext,
    form::FieldErrors,
    routes::auth::{LoginPath, SignupPath},
    views::{CsrfField, Escaped, FieldError, render},
};

#[must_use]
pub fn login(
    context: &PageContext,
    username: &str,
    next: Option<&str>,
    errors: &FieldErrors,
) -> String {
    let next_field = next.map_or_else(String::new, |next| {
        format!(
            "<input type=\"hidden\" name=\"next\" value=\"{}\">",
            Escaped(next)
        )
    });

    let body = format!(
        "<h1>Log in</h1>\n{}\
         <form method=\"post\" action=\"{}\">{}{next_field}\n\
         <label for=\"id_username\">Username</label>\n\
         <input type=\"text\" name=\"username\" id=\"id_username\" value=\"{}\" required autofocus>\n\
         <label for=\"id_password\">Password</label>\n\
         <input type=\"password\" name=\"password\" id=\"id_password\" required>\n\
         <button type=\"submit\">Log in</button>\n</form>\n\
         <p>No account yet? <a href=\"{}\">Sign up</a></p>\n",
        FieldError(errors.get(FieldErrors::NON_FIELD)),
        LoginPath(),
        CsrfField(&context.csrf),
        Escaped(username),
        SignupPath(),
    );

    render("Log in", Some(context), body)
}

#[must_use]
pub fn signup(
    context: &PageContext,
    username: &str,
    email: &str,
    errors: &FieldErrors,
) -> String {
    let body = format!(
        "<h1>Sign up</h1>\n\
         <form method=\"post\" action=\"{}\">{}\n\
         <label for=\"id_username\">Username</label>\n\
         <input type=\"text\" name=\"username\" id=\"id_username\" value=\"{}\" required>{}\n\
         <label for=\"id_email\">Email address</label>\n\
         <input type=\"email\" name=\"email\" id=\"id_email\" value=\"{}\" required>{}\n\
         <label for=\"id_password1\">Password</label>\n\
         <input type=\"password\" name=\"password1\" id=\"id_password1\" required>{}\n\
         <label for=\"id_password2\">Password confirmation</label>\n\
         <input type=\"password\" name=\"password2\" id=\"id_password2\" required>{}\n\
         <button type=\"submit\">Sign up</button>\n</form>\n",
        SignupPath(),
        CsrfField(&context.csrf),
        Escaped(username),
        FieldError(errors.get("username")),
        Escaped(email),
        FieldError(errors.get("email")),
        FieldError(errors.get("password1")),
        FieldError(errors.get("password2")),
    );

    render("Sign up", Some(context), body)
}
